//! User-mode stand-in for the kernel streaming framework.
//!
//! [`SimulatedHost`] implements [`StreamingHost`] with injectable failures and
//! keeps the books the real host keeps: which images have an unload routine,
//! a binding, a factory. [`HostHarness`] plays the loader, driving
//! [`Lifecycle`] through load and unload the way the OS does and refusing
//! sequences the OS would never produce.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::vec::Vec;

use log::{debug, warn};
use thiserror::Error;

use crate::descriptor::CapabilityDescriptor;
use crate::host::StreamingHost;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::status::NtStatus;

/*──────────────────────────── identities ────────────────────────────────*/

/// A simulated `DRIVER_OBJECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimIdentity(pub u32);

impl fmt::Display for SimIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "driver-object#{}", self.0)
    }
}

/*──────────────────────────── bookkeeping ───────────────────────────────*/

/// Host-owned resources created on behalf of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Binding,
    Factory,
}

/// Every call crossing the host boundary, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    SetUnloadRoutine(SimIdentity),
    InitializeDriver(SimIdentity),
    CreateFilterFactory(SimIdentity),
    UnloadCallback(SimIdentity),
    Release(SimIdentity, Resource),
}

/// Something the real host would have crashed or bugchecked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFault {
    DoubleRelease(SimIdentity, Resource),
    ForeignBinding { identity: SimIdentity, owner: SimIdentity },
    StaleBinding(SimIdentity),
}

/// Statuses to return instead of success, per step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FaultPlan {
    pub callback: Option<NtStatus>,
    pub bind: Option<NtStatus>,
    pub register: Option<NtStatus>,
}

impl FaultPlan {
    pub fn fail_bind(status: NtStatus) -> Self {
        Self { bind: Some(status), ..Self::default() }
    }

    pub fn fail_register(status: NtStatus) -> Self {
        Self { register: Some(status), ..Self::default() }
    }

    pub fn fail_callback(status: NtStatus) -> Self {
        Self { callback: Some(status), ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot<T> {
    Empty,
    Live(T),
    Released,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Empty
    }
}

#[derive(Debug, Default)]
struct DriverRecord {
    unload_routine: bool,
    binding: Slot<u64>,
    factory: Slot<&'static CapabilityDescriptor>,
}

/// Token handed out by [`SimulatedHost::initialize_driver`].
#[derive(Debug, PartialEq, Eq)]
pub struct SimBinding {
    owner: SimIdentity,
    serial: u64,
}

impl SimBinding {
    pub fn owner(&self) -> SimIdentity {
        self.owner
    }
}

/*──────────────────────────── the host ──────────────────────────────────*/

#[derive(Debug, Default)]
pub struct SimulatedHost {
    plans: RefCell<BTreeMap<SimIdentity, FaultPlan>>,
    records: RefCell<BTreeMap<SimIdentity, DriverRecord>>,
    calls: RefCell<Vec<HostCall>>,
    faults: RefCell<Vec<HostFault>>,
    next_serial: Cell<u64>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject failures for every later call made on behalf of `identity`.
    pub fn plan(&self, identity: SimIdentity, plan: FaultPlan) {
        self.plans.borrow_mut().insert(identity, plan);
    }

    /// Start a fresh load cycle: the loader hands out a new driver object.
    pub fn begin_load(&self, identity: SimIdentity) {
        self.records.borrow_mut().insert(identity, DriverRecord::default());
    }

    /// Host side of unloading an image that completed `DriverEntry`.
    ///
    /// Runs the driver's unload callback if one was installed, then releases
    /// whatever the host created for it. Returns whether the callback ran.
    pub fn unload_driver(&self, identity: SimIdentity, unload: impl FnOnce(SimIdentity)) -> bool {
        let has_routine = self.with_record(identity, |rec| rec.unload_routine);
        if has_routine {
            self.calls.borrow_mut().push(HostCall::UnloadCallback(identity));
            unload(identity);
        }
        self.release_all(identity);
        has_routine
    }

    /// Host side of rejecting a load without calling back into the driver.
    pub fn discard_load(&self, identity: SimIdentity) {
        self.release_all(identity);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(*c)).count()
    }

    pub fn faults(&self) -> Vec<HostFault> {
        self.faults.borrow().clone()
    }

    pub fn unload_routine_installed(&self, identity: SimIdentity) -> bool {
        self.with_record(identity, |rec| rec.unload_routine)
    }

    pub fn has_live_binding(&self, identity: SimIdentity) -> bool {
        self.with_record(identity, |rec| matches!(rec.binding, Slot::Live(_)))
    }

    /// Descriptor the live factory of `identity` was registered with.
    pub fn factory_descriptor(&self, identity: SimIdentity) -> Option<&'static CapabilityDescriptor> {
        self.with_record(identity, |rec| match rec.factory {
            Slot::Live(desc) => Some(desc),
            _ => None,
        })
    }

    /// Number of factories currently registered across all images.
    pub fn live_factories(&self) -> usize {
        self.records
            .borrow()
            .values()
            .filter(|rec| matches!(rec.factory, Slot::Live(_)))
            .count()
    }

    fn with_record<R>(&self, identity: SimIdentity, f: impl FnOnce(&DriverRecord) -> R) -> R {
        let mut records = self.records.borrow_mut();
        f(records.entry(identity).or_default())
    }

    fn plan_for(&self, identity: SimIdentity) -> FaultPlan {
        self.plans.borrow().get(&identity).copied().unwrap_or_default()
    }

    fn release_all(&self, identity: SimIdentity) {
        let mut records = self.records.borrow_mut();
        let rec = records.entry(identity).or_default();

        // Factories go before the binding they hang off.
        let factory = release_slot(&mut rec.factory);
        let binding = release_slot(&mut rec.binding);
        rec.unload_routine = false;
        drop(records);

        for (resource, outcome) in [(Resource::Factory, factory), (Resource::Binding, binding)] {
            match outcome {
                Released::Now => {
                    debug!("host released {resource:?} of {identity}");
                    self.calls.borrow_mut().push(HostCall::Release(identity, resource));
                }
                Released::Twice => {
                    warn!("host asked to release {resource:?} of {identity} twice");
                    self.faults.borrow_mut().push(HostFault::DoubleRelease(identity, resource));
                }
                Released::Nothing => {}
            }
        }
    }
}

enum Released {
    Now,
    Twice,
    Nothing,
}

fn release_slot<T>(slot: &mut Slot<T>) -> Released {
    match std::mem::replace(slot, Slot::Released) {
        Slot::Live(_) => Released::Now,
        Slot::Released => Released::Twice,
        Slot::Empty => {
            *slot = Slot::Empty;
            Released::Nothing
        }
    }
}

impl StreamingHost for SimulatedHost {
    type Identity = SimIdentity;
    type Binding = SimBinding;

    fn set_unload_routine(&self, identity: SimIdentity) -> Result<(), NtStatus> {
        self.calls.borrow_mut().push(HostCall::SetUnloadRoutine(identity));
        if let Some(st) = self.plan_for(identity).callback {
            return Err(st);
        }
        self.records.borrow_mut().entry(identity).or_default().unload_routine = true;
        Ok(())
    }

    fn initialize_driver(&self, identity: SimIdentity) -> Result<SimBinding, NtStatus> {
        self.calls.borrow_mut().push(HostCall::InitializeDriver(identity));
        if let Some(st) = self.plan_for(identity).bind {
            return Err(st);
        }
        let serial = self.next_serial.get() + 1;
        self.next_serial.set(serial);
        self.records.borrow_mut().entry(identity).or_default().binding = Slot::Live(serial);
        Ok(SimBinding { owner: identity, serial })
    }

    fn create_filter_factory(
        &self,
        identity: SimIdentity,
        binding: &SimBinding,
        descriptor: &'static CapabilityDescriptor,
    ) -> Result<(), NtStatus> {
        self.calls.borrow_mut().push(HostCall::CreateFilterFactory(identity));

        if binding.owner != identity {
            self.faults
                .borrow_mut()
                .push(HostFault::ForeignBinding { identity, owner: binding.owner });
            return Err(NtStatus::INVALID_PARAMETER);
        }
        let live = self.with_record(identity, |rec| rec.binding == Slot::Live(binding.serial));
        if !live {
            self.faults.borrow_mut().push(HostFault::StaleBinding(identity));
            return Err(NtStatus::INVALID_DEVICE_STATE);
        }

        if let Some(st) = self.plan_for(identity).register {
            return Err(st);
        }
        self.records.borrow_mut().entry(identity).or_default().factory = Slot::Live(descriptor);
        Ok(())
    }
}

/*──────────────────────────── the loader ────────────────────────────────*/

/// Calls the loader would never make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HarnessError {
    #[error("{0} already has a load cycle in progress")]
    AlreadyLoaded(SimIdentity),

    #[error("{0} was never loaded")]
    NotLoaded(SimIdentity),

    #[error("{0} was already unloaded")]
    AlreadyUnloaded(SimIdentity),
}

/// Drives one [`Lifecycle`] per identity through the OS calling contract.
#[derive(Debug, Default)]
pub struct HostHarness {
    host: SimulatedHost,
    drivers: BTreeMap<SimIdentity, Lifecycle>,
}

impl HostHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(host: SimulatedHost) -> Self {
        Self { host, drivers: BTreeMap::new() }
    }

    pub fn host(&self) -> &SimulatedHost {
        &self.host
    }

    pub fn state(&self, identity: SimIdentity) -> Option<LifecycleState> {
        self.drivers.get(&identity).map(Lifecycle::state)
    }

    /// Invoke `DriverEntry` for a new image. Returns what the driver returned.
    pub fn load(&mut self, identity: SimIdentity) -> Result<NtStatus, HarnessError> {
        if let Some(lc) = self.drivers.get(&identity) {
            if lc.state() != LifecycleState::Unloaded {
                return Err(HarnessError::AlreadyLoaded(identity));
            }
        }
        self.host.begin_load(identity);
        let mut lifecycle = Lifecycle::for_microphone();
        let status = lifecycle.on_load(&self.host, identity);
        self.drivers.insert(identity, lifecycle);
        Ok(status)
    }

    /// Unload an image whose `DriverEntry` has returned.
    pub fn unload(&mut self, identity: SimIdentity) -> Result<(), HarnessError> {
        let lifecycle = self.drivers.get_mut(&identity).ok_or(HarnessError::NotLoaded(identity))?;
        if lifecycle.state() == LifecycleState::Unloaded {
            return Err(HarnessError::AlreadyUnloaded(identity));
        }
        let called_back = self.host.unload_driver(identity, |id| lifecycle.on_unload(id));
        if !called_back {
            // No routine to tell the driver; the cycle still ends here.
            *lifecycle = Lifecycle::resume(lifecycle.descriptor(), LifecycleState::Unloaded);
        }
        Ok(())
    }

    /// Drop a failed image without calling its unload routine.
    pub fn discard(&mut self, identity: SimIdentity) -> Result<(), HarnessError> {
        let lifecycle = self.drivers.get_mut(&identity).ok_or(HarnessError::NotLoaded(identity))?;
        if lifecycle.state() == LifecycleState::Unloaded {
            return Err(HarnessError::AlreadyUnloaded(identity));
        }
        self.host.discard_load(identity);
        *lifecycle = Lifecycle::resume(lifecycle.descriptor(), LifecycleState::Unloaded);
        Ok(())
    }
}
