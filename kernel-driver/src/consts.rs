//! Kernel-streaming constants missing in `wdk‑sys`.
//!
//! `ks.h` is not part of the generated bindings, so the few values the filter
//! descriptor and the KS device need are spelled out here.

/*────────── KSFILTER_DESCRIPTOR ─────────*/

/// `KSFILTER_DESCRIPTOR_VERSION` is `((ULONG)-1)`.
pub const KSFILTER_DESCRIPTOR_VERSION: u32 = u32::MAX;

/*────────── KSPIN_DATAFLOW ─────────*/

pub const KSPIN_DATAFLOW_IN: i32 = 1;
pub const KSPIN_DATAFLOW_OUT: i32 = 2;

/*────────── KSPIN_COMMUNICATION ─────────*/

pub const KSPIN_COMMUNICATION_NONE: i32 = 0;
pub const KSPIN_COMMUNICATION_SINK: i32 = 1;
pub const KSPIN_COMMUNICATION_SOURCE: i32 = 2;
pub const KSPIN_COMMUNICATION_BOTH: i32 = 3;
pub const KSPIN_COMMUNICATION_BRIDGE: i32 = 4;

/*────────── KsCreateFilterFactory ─────────*/

/// `KSCREATE_ITEM_*` flags for the factory's create item; none needed.
pub const KSCREATE_ITEM_NONE: u32 = 0;

/*────────── KS device ─────────*/

/// `FILE_DEVICE_KS`.
pub const FILE_DEVICE_KS: u32 = 0x0000_002F;
pub const FILE_DEVICE_SECURE_OPEN: u32 = 0x0000_0100;
pub const DO_DEVICE_INITIALIZING: u32 = 0x0000_0080;

/// `InterfaceTypeUndefined`: no legacy bus behind the detected device.
pub const INTERFACE_TYPE_UNDEFINED: i32 = -1;

/// AVStream keeps its `KSDEVICE_HEADER` pointer first in the device extension.
pub const KSDEVICE_HEADER_SIZE: u32 = core::mem::size_of::<*mut core::ffi::c_void>() as u32;
