//! The seam between the lifecycle and the OS streaming framework.
//!
//! In the kernel build this is implemented on top of `ks.sys`
//! (`KsInitializeDriver`, `KsCreateFilterFactory`); in user mode by
//! [`crate::sim::SimulatedHost`].

use core::fmt;

use crate::descriptor::CapabilityDescriptor;
use crate::status::NtStatus;

/// Operations the driver asks of its host during `DriverEntry`.
///
/// Handles returned by the host are opaque tokens. The driver never frees
/// them: the host tears down bindings and factory registrations itself when
/// the image unloads or when a load is rejected.
pub trait StreamingHost {
    /// Handle for the loaded driver image (`DRIVER_OBJECT` in the kernel).
    type Identity: Copy + fmt::Debug;

    /// Proof that the streaming subsystem is attached to the image.
    type Binding;

    /// Install the driver's unload callback on `identity`.
    fn set_unload_routine(&self, identity: Self::Identity) -> Result<(), NtStatus>;

    /// Attach the image to the streaming framework.
    ///
    /// Called at most once per load.
    fn initialize_driver(&self, identity: Self::Identity) -> Result<Self::Binding, NtStatus>;

    /// Create the filter factory for `descriptor`.
    ///
    /// On success the host owns the resulting registration and may
    /// instantiate filters from it at any time.
    fn create_filter_factory(
        &self,
        identity: Self::Identity,
        binding: &Self::Binding,
        descriptor: &'static CapabilityDescriptor,
    ) -> Result<(), NtStatus>;
}
