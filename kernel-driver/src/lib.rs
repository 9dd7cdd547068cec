//! micdrop: AVStream virtual microphone driver.
//!
//! `DriverEntry` installs the unload routine, binds the image to kernel
//! streaming and registers one filter factory for the virtual microphone.
//! The sequencing lives in [`shared::Lifecycle`]; this crate only supplies
//! the `ks.sys` side of it.

#![no_std]

extern crate alloc;
#[cfg(not(test))]
extern crate wdk_panic;

use core::sync::atomic::{AtomicU8, Ordering};

use shared::constants::TARGET_LIFECYCLE;
use shared::{Lifecycle, LifecycleState, MIC_CAPTURE_FILTER};
#[cfg(not(test))]
use wdk_alloc::WdkAllocator;
use wdk_sys::{DRIVER_OBJECT, NTSTATUS, PCUNICODE_STRING};

mod consts;
mod helpers;
mod host;
mod ks;
mod logger;

use host::KsHost;

/*------------ globals & allocator -----------------------*/

/// Where the load left off, for the unload routine to pick up.
static LOAD_STATE: AtomicU8 = AtomicU8::new(LifecycleState::NotLoaded as u8);

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: WdkAllocator = WdkAllocator;

/*------------ DriverEntry -------------------------------*/

#[unsafe(export_name = "DriverEntry")]
pub extern "system" fn driver_entry(
    driver: *mut DRIVER_OBJECT,
    registry_path: PCUNICODE_STRING,
) -> NTSTATUS {
    logger::init();

    // SAFETY: the loader passes a valid registry path for this service.
    let reg_path = unsafe { helpers::uni_to_string(registry_path) };
    log::debug!(target: TARGET_LIFECYCLE, "registry path: {reg_path}");

    let host = KsHost::new(registry_path);
    let mut lifecycle = Lifecycle::for_microphone();
    let status = lifecycle.on_load(&host, driver);

    LOAD_STATE.store(lifecycle.state() as u8, Ordering::Release);
    status.raw()
}

/*------------ unload ------------------------------------*/

/// Installed on the driver object before anything in `DriverEntry` can fail.
pub(crate) unsafe extern "C" fn driver_unload(driver: *mut DRIVER_OBJECT) {
    let state = LifecycleState::from_u8(LOAD_STATE.load(Ordering::Acquire))
        .unwrap_or(LifecycleState::Failed);

    let mut lifecycle = Lifecycle::resume(&MIC_CAPTURE_FILTER, state);
    lifecycle.on_unload(driver);

    LOAD_STATE.store(lifecycle.state() as u8, Ordering::Release);
}
