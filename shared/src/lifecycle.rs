//! Load/unload state machine of the driver image.
//!
//! ```text
//! NotLoaded -> BindingInProgress -> Bound -> FactoryRegistered -> Unloaded
//!                     |               |
//!                     +---------------+----> Failed ------------> Unloaded
//! ```
//!
//! The host calls [`Lifecycle::on_load`] once, waits for it to return, and
//! calls [`Lifecycle::on_unload`] at most once afterwards. Those ordering
//! rules are the host's to keep; nothing here guards against their violation.

use core::fmt;

use log::{debug, error, info};

use crate::constants::{TARGET_BINDING, TARGET_LIFECYCLE, TARGET_REGISTRAR};
use crate::descriptor::{CapabilityDescriptor, MIC_CAPTURE_FILTER};
use crate::error::LoadError;
use crate::host::StreamingHost;
use crate::status::NtStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    NotLoaded = 0,
    BindingInProgress = 1,
    Bound = 2,
    FactoryRegistered = 3,
    Failed = 4,
    Unloaded = 5,
}

impl LifecycleState {
    /// Inverse of `state as u8`, for hosts that park the state in an integer.
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::NotLoaded,
            1 => Self::BindingInProgress,
            2 => Self::Bound,
            3 => Self::FactoryRegistered,
            4 => Self::Failed,
            5 => Self::Unloaded,
            _ => return None,
        })
    }

    /// `on_load` has returned, one way or the other.
    pub const fn is_load_outcome(self) -> bool {
        matches!(self, Self::FactoryRegistered | Self::Failed)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotLoaded => "not-loaded",
            Self::BindingInProgress => "binding",
            Self::Bound => "bound",
            Self::FactoryRegistered => "factory-registered",
            Self::Failed => "failed",
            Self::Unloaded => "unloaded",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One load cycle of the driver image.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
    descriptor: &'static CapabilityDescriptor,
}

impl Lifecycle {
    pub const fn new(descriptor: &'static CapabilityDescriptor) -> Self {
        Self { state: LifecycleState::NotLoaded, descriptor }
    }

    /// Lifecycle registering the virtual microphone.
    pub const fn for_microphone() -> Self {
        Self::new(&MIC_CAPTURE_FILTER)
    }

    /// Pick a cycle back up in `state`, e.g. when the unload callback runs
    /// on a later call than `DriverEntry`.
    pub const fn resume(descriptor: &'static CapabilityDescriptor, state: LifecycleState) -> Self {
        Self { state, descriptor }
    }

    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    pub const fn descriptor(&self) -> &'static CapabilityDescriptor {
        self.descriptor
    }

    /// `DriverEntry`: returns `SUCCESS` or the status of the step that failed.
    pub fn on_load<H: StreamingHost>(&mut self, host: &H, identity: H::Identity) -> NtStatus {
        match self.load(host, identity) {
            Ok(()) => NtStatus::SUCCESS,
            Err(err) => err.status(),
        }
    }

    /// The load sequence. Short-circuits on the first failing step.
    pub fn load<H: StreamingHost>(&mut self, host: &H, identity: H::Identity) -> Result<(), LoadError> {
        info!(target: TARGET_LIFECYCLE, "initializing virtual microphone driver ({identity:?})");

        // Unload has to be reachable before anything that can fail.
        if let Err(st) = host.set_unload_routine(identity) {
            self.state = LifecycleState::Failed;
            error!(target: TARGET_LIFECYCLE, "unload callback registration failed: {st}");
            return Err(LoadError::CallbackRegistration(st));
        }

        let binding = self.bind(host, identity)?;
        self.register(host, identity, &binding)?;

        info!(target: TARGET_LIFECYCLE, "virtual microphone driver initialized");
        Ok(())
    }

    /// Attach to the streaming subsystem.
    ///
    /// The caller guarantees this is the first binding attempt of the cycle.
    pub fn bind<H: StreamingHost>(
        &mut self,
        host: &H,
        identity: H::Identity,
    ) -> Result<H::Binding, LoadError> {
        self.state = LifecycleState::BindingInProgress;
        debug!(target: TARGET_BINDING, "binding streaming subsystem");

        match host.initialize_driver(identity) {
            Ok(binding) => {
                self.state = LifecycleState::Bound;
                info!(target: TARGET_BINDING, "streaming subsystem bound");
                Ok(binding)
            }
            Err(st) => {
                self.state = LifecycleState::Failed;
                error!(target: TARGET_BINDING, "streaming subsystem binding failed: {st}");
                Err(LoadError::Binding(st))
            }
        }
    }

    /// Register the descriptor as a filter factory.
    ///
    /// The caller guarantees [`bind`](Self::bind) succeeded. A failure leaves
    /// the binding in place for the host to tear down.
    pub fn register<H: StreamingHost>(
        &mut self,
        host: &H,
        identity: H::Identity,
        binding: &H::Binding,
    ) -> Result<(), LoadError> {
        debug!(target: TARGET_REGISTRAR, "creating filter factory for {}", self.descriptor.name);

        match host.create_filter_factory(identity, binding, self.descriptor) {
            Ok(()) => {
                self.state = LifecycleState::FactoryRegistered;
                info!(target: TARGET_REGISTRAR, "filter factory registered ({})", self.descriptor.reference);
                Ok(())
            }
            Err(st) => {
                self.state = LifecycleState::Failed;
                error!(target: TARGET_REGISTRAR, "filter factory registration failed: {st}");
                Err(LoadError::Registration(st))
            }
        }
    }

    /// `DriverUnload`. Logs only; the host releases the binding and factory.
    pub fn on_unload<I: fmt::Debug>(&mut self, identity: I) {
        let previous = self.state;
        if previous == LifecycleState::Unloaded {
            debug!(target: TARGET_LIFECYCLE, "unload already observed ({identity:?})");
            return;
        }
        self.state = LifecycleState::Unloaded;
        info!(
            target: TARGET_LIFECYCLE,
            "virtual microphone driver unloaded ({identity:?}, was {previous})"
        );
    }
}
