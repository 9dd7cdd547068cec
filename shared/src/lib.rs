//! Shared core of the micdrop virtual microphone driver.
//!
//! The `kernel` feature builds everything `no_std` so the driver can link it;
//! the default `std` feature adds the host simulation used by tests and
//! `load_sim`.
//!
//! * [`descriptor`] - the static capability descriptor of the virtual microphone.
//! * [`host`]       - the seam to the OS streaming framework.
//! * [`lifecycle`]  - the load/unload state machine driven by the host.
//! * [`sim`]        - a user-mode stand-in for the host framework.

#![cfg_attr(feature = "kernel", no_std)]

// A workspace build unifies both features; the simulation still needs std.
#[cfg(all(feature = "kernel", feature = "std"))]
extern crate std;

pub mod constants;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod status;

#[cfg(feature = "std")]
pub mod sim;

pub use descriptor::{CapabilityDescriptor, MIC_CAPTURE_FILTER};
pub use error::LoadError;
pub use host::StreamingHost;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use status::NtStatus;
