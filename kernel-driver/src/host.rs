//! [`StreamingHost`] on top of `ks.sys`.
//!
//! * Unload routine  → `DRIVER_OBJECT::DriverUnload`
//! * Binding         → `KsInitializeDriver`, then a KS device on a detected PDO
//! * Factory         → `KsCreateFilterFactory` with [`ks::FILTER_DESCRIPTOR`]
//!
//! Nothing created here is ever freed by the driver once the binding exists:
//! KS owns the device's PnP dispatch and tears the device and the factory
//! down on removal.

use core::ptr;

use shared::{CapabilityDescriptor, MIC_CAPTURE_FILTER, NtStatus, StreamingHost};
use wdk_sys::ntddk::{IoAttachDeviceToDeviceStack, IoCreateDevice, IoDeleteDevice, IoDetachDevice};
use wdk_sys::{
    PCUNICODE_STRING, PDEVICE_OBJECT, PDRIVER_OBJECT, PUNICODE_STRING, STATUS_NO_SUCH_DEVICE,
};

use crate::consts::{
    DO_DEVICE_INITIALIZING, FILE_DEVICE_KS, FILE_DEVICE_SECURE_OPEN, INTERFACE_TYPE_UNDEFINED,
    KSCREATE_ITEM_NONE, KSDEVICE_HEADER_SIZE,
};
use crate::ks::{
    self, IoReportDetectedDevice, KsCreateFilterFactory, KsInitializeDevice, KsInitializeDriver,
};

/// The kernel streaming framework, as seen from `DriverEntry`.
pub struct KsHost {
    registry_path: PCUNICODE_STRING,
}

impl KsHost {
    pub fn new(registry_path: PCUNICODE_STRING) -> Self {
        Self { registry_path }
    }
}

/// Outcome of binding: the functional device object KS manages for us.
pub struct KsBinding {
    device: PDEVICE_OBJECT,
}

/// Create the KS device the factory hangs off.
///
/// `DriverEntry` runs before PnP would ever call `AddDevice`, so the image
/// reports its own root-enumerated PDO and stacks an AVStream FDO on it.
///
/// # Safety
/// `driver` must be the driver object passed to `DriverEntry`, already bound
/// with `KsInitializeDriver`.
unsafe fn create_ks_device(driver: PDRIVER_OBJECT) -> Result<PDEVICE_OBJECT, NtStatus> {
    let mut pdo: PDEVICE_OBJECT = ptr::null_mut();
    // SAFETY: no resources are claimed; PnP hands back a fresh PDO.
    let st = unsafe {
        IoReportDetectedDevice(
            driver,
            INTERFACE_TYPE_UNDEFINED,
            u32::MAX,
            u32::MAX,
            ptr::null_mut(),
            ptr::null_mut(),
            0,
            &mut pdo,
        )
    };
    NtStatus::from_raw(st).into_result()?;

    let mut fdo: PDEVICE_OBJECT = ptr::null_mut();
    // SAFETY: unnamed device; the extension holds KS's device header.
    let st = unsafe {
        IoCreateDevice(
            driver,
            KSDEVICE_HEADER_SIZE,
            ptr::null_mut(),
            FILE_DEVICE_KS,
            FILE_DEVICE_SECURE_OPEN,
            0,
            &mut fdo,
        )
    };
    NtStatus::from_raw(st).into_result()?;

    // SAFETY: both devices were created above and are not yet started.
    let next = unsafe { IoAttachDeviceToDeviceStack(fdo, pdo) };
    if next.is_null() {
        // SAFETY: nothing references the FDO yet.
        unsafe { IoDeleteDevice(fdo) };
        return Err(NtStatus::from_raw(STATUS_NO_SUCH_DEVICE));
    }

    // SAFETY: FDO, PDO and the attached-to device form one stack.
    let st = unsafe { KsInitializeDevice(fdo, pdo, next, ptr::null()) };
    if let Err(st) = NtStatus::from_raw(st).into_result() {
        // SAFETY: KS declined the device; undo the attach before deleting.
        unsafe {
            IoDetachDevice(next);
            IoDeleteDevice(fdo);
        }
        return Err(st);
    }

    // SAFETY: the FDO is ours until PnP starts it.
    unsafe { (*fdo).Flags &= !DO_DEVICE_INITIALIZING };
    Ok(fdo)
}

impl StreamingHost for KsHost {
    type Identity = PDRIVER_OBJECT;
    type Binding = KsBinding;

    fn set_unload_routine(&self, driver: PDRIVER_OBJECT) -> Result<(), NtStatus> {
        if driver.is_null() {
            return Err(NtStatus::INVALID_PARAMETER);
        }
        // SAFETY: the loader hands `DriverEntry` a valid, writable DRIVER_OBJECT.
        unsafe { (*driver).DriverUnload = Some(crate::driver_unload) };
        Ok(())
    }

    fn initialize_driver(&self, driver: PDRIVER_OBJECT) -> Result<KsBinding, NtStatus> {
        // SAFETY: both pointers come straight from the loader; a null device
        // descriptor lets KS install its default dispatch.
        let st = unsafe {
            KsInitializeDriver(driver, self.registry_path as PUNICODE_STRING, ptr::null())
        };
        NtStatus::from_raw(st).into_result()?;

        // SAFETY: `driver` is valid for the whole of DriverEntry and bound above.
        let device = unsafe { create_ks_device(driver)? };
        Ok(KsBinding { device })
    }

    fn create_filter_factory(
        &self,
        _driver: PDRIVER_OBJECT,
        binding: &KsBinding,
        descriptor: &'static CapabilityDescriptor,
    ) -> Result<(), NtStatus> {
        // Only the shipped descriptor has a KS rendition.
        if !ptr::eq(descriptor, &MIC_CAPTURE_FILTER) {
            return Err(NtStatus::INVALID_PARAMETER);
        }

        // SAFETY: FILTER_DESCRIPTOR and everything it points at is 'static and
        // immutable; KS owns the factory it creates.
        let st = unsafe {
            KsCreateFilterFactory(
                binding.device,
                &ks::FILTER_DESCRIPTOR.0,
                ptr::null(),
                ptr::null_mut(),
                KSCREATE_ITEM_NONE,
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
            )
        };
        NtStatus::from_raw(st).into_result()
    }
}
