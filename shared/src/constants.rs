//! Names shared by the driver and the user-mode tooling.

/// Name reported in diagnostics.
pub const DRIVER_NAME: &str = "micdrop";

/// `log` targets, one per lifecycle component.
pub const TARGET_LIFECYCLE: &str = "micdrop::lifecycle";
pub const TARGET_BINDING: &str = "micdrop::binding";
pub const TARGET_REGISTRAR: &str = "micdrop::registrar";
