//! `ks.sys` surface used by the driver.
//!
//! * FFI declarations for `KsInitializeDriver` / `KsInitializeDevice` /
//!   `KsCreateFilterFactory`, plus `IoReportDetectedDevice`.
//! * `#[repr(C)]` mirrors of the KS descriptor structures.
//! * [`FILTER_DESCRIPTOR`], the KS rendition of
//!   [`shared::descriptor::MIC_CAPTURE_FILTER`], built entirely at compile time.
//!
//! KS keeps a pointer to the filter descriptor for as long as the factory
//! lives, so everything reachable from it is `static`.

#![allow(non_snake_case)]

use core::{ffi::c_void, mem, ptr};

use shared::descriptor::{
    guids, AudioDataRange, Communication, DataFlow, Guid, PinDescriptor, MIC_CATEGORIES, MIC_PINS,
};
use wdk_sys::{DRIVER_OBJECT, GUID, NTSTATUS, PDEVICE_OBJECT, PUNICODE_STRING};

use crate::consts::*;

/*──────────────────────────────── FFI ───────────────────────────────────*/

#[link(name = "ks")]
unsafe extern "system" {
    pub fn KsInitializeDriver(
        driver_object: *mut DRIVER_OBJECT,
        registry_path_name: PUNICODE_STRING,
        descriptor: *const c_void,
    ) -> NTSTATUS;

    pub fn KsInitializeDevice(
        functional_device_object: PDEVICE_OBJECT,
        physical_device_object: PDEVICE_OBJECT,
        next_device_object: PDEVICE_OBJECT,
        descriptor: *const c_void,
    ) -> NTSTATUS;

    pub fn KsCreateFilterFactory(
        device_object: PDEVICE_OBJECT,
        descriptor: *const KsFilterDescriptor,
        ref_string: *const u16,
        security_descriptor: *mut c_void,
        create_item_flags: u32,
        sleep_callback: *const c_void,
        wake_callback: *const c_void,
        filter_factory: *mut *mut c_void,
    ) -> NTSTATUS;
}

// Exported by ntoskrnl, but its INTERFACE_TYPE argument is spelled as a plain
// `i32` here.
unsafe extern "system" {
    pub fn IoReportDetectedDevice(
        driver_object: *mut DRIVER_OBJECT,
        legacy_bus_type: i32,
        bus_number: u32,
        slot_number: u32,
        resource_list: *mut c_void,
        resource_requirements: *mut c_void,
        resource_assigned: u8,
        device_object: *mut PDEVICE_OBJECT,
    ) -> NTSTATUS;
}

/*──────────────────────────── ABI mirrors ───────────────────────────────*/

/// `KSDATARANGE` (a `KSDATAFORMAT`, 8-byte aligned by its `LONGLONG` arm).
#[repr(C, align(8))]
pub struct KsDataRange {
    pub FormatSize: u32,
    pub Flags: u32,
    pub SampleSize: u32,
    pub Reserved: u32,
    pub MajorFormat: GUID,
    pub SubFormat: GUID,
    pub Specifier: GUID,
}

/// `KSDATARANGE_AUDIO`.
#[repr(C)]
pub struct KsDataRangeAudio {
    pub DataRange: KsDataRange,
    pub MaximumChannels: u32,
    pub MinimumBitsPerSample: u32,
    pub MaximumBitsPerSample: u32,
    pub MinimumSampleFrequency: u32,
    pub MaximumSampleFrequency: u32,
}

/// `KSPIN_DESCRIPTOR`, with the constrained-range arm of its trailing union.
#[repr(C)]
pub struct KsPinDescriptor {
    pub InterfacesCount: u32,
    pub Interfaces: *const c_void,
    pub MediumsCount: u32,
    pub Mediums: *const c_void,
    pub DataRangesCount: u32,
    pub DataRanges: *const *const KsDataRange,
    pub DataFlow: i32,
    pub Communication: i32,
    pub Category: *const GUID,
    pub Name: *const GUID,
    pub ConstrainedDataRangesCount: u32,
    pub ConstrainedDataRanges: *const *const KsDataRange,
}

/// `KSPIN_DESCRIPTOR_EX`. No dispatch: the filter never creates pins.
#[repr(C)]
pub struct KsPinDescriptorEx {
    pub Dispatch: *const c_void,
    pub AutomationTable: *const c_void,
    pub PinDescriptor: KsPinDescriptor,
    pub Flags: u32,
    pub InstancesPossible: u32,
    pub InstancesNecessary: u32,
    pub AllocatorFraming: *const c_void,
    pub IntersectHandler: *const c_void,
}

/// `KSFILTER_DESCRIPTOR`.
#[repr(C)]
pub struct KsFilterDescriptor {
    pub Dispatch: *const c_void,
    pub AutomationTable: *const c_void,
    pub Version: u32,
    pub Flags: u32,
    pub ReferenceGuid: *const GUID,
    pub PinDescriptorsCount: u32,
    pub PinDescriptorSize: u32,
    pub PinDescriptors: *const KsPinDescriptorEx,
    pub CategoriesCount: u32,
    pub Categories: *const GUID,
    pub NodeDescriptorsCount: u32,
    pub NodeDescriptorSize: u32,
    pub NodeDescriptors: *const c_void,
    pub ConnectionsCount: u32,
    pub Connections: *const c_void,
    pub ComponentId: *const c_void,
}

/// Read-only KS data placed in a `static`.
///
/// The raw pointers inside only ever point at other immutable statics.
#[repr(transparent)]
pub struct KsStatic<T>(pub T);

// SAFETY: wrapped values are never written after initialisation and only
// reference `'static` immutable data.
unsafe impl<T> Sync for KsStatic<T> {}

/*──────────────────────── const lowering ────────────────────────────────*/

const fn guid(g: Guid) -> GUID {
    GUID { Data1: g.data1, Data2: g.data2, Data3: g.data3, Data4: g.data4 }
}

const fn guids<const N: usize>(src: &[Guid; N]) -> [GUID; N] {
    let mut out = [guid(Guid::from_u128(0)); N];
    let mut i = 0;
    while i < N {
        out[i] = guid(src[i]);
        i += 1;
    }
    out
}

const fn audio_range(r: &AudioDataRange) -> KsDataRangeAudio {
    KsDataRangeAudio {
        DataRange: KsDataRange {
            FormatSize: mem::size_of::<KsDataRangeAudio>() as u32,
            Flags: 0,
            SampleSize: 0,
            Reserved: 0,
            MajorFormat: guid(r.major_format),
            SubFormat: guid(r.sub_format),
            Specifier: guid(r.specifier),
        },
        MaximumChannels: r.max_channels,
        MinimumBitsPerSample: r.min_bits_per_sample,
        MaximumBitsPerSample: r.max_bits_per_sample,
        MinimumSampleFrequency: r.min_sample_frequency,
        MaximumSampleFrequency: r.max_sample_frequency,
    }
}

const fn data_flow(flow: DataFlow) -> i32 {
    match flow {
        DataFlow::In => KSPIN_DATAFLOW_IN,
        DataFlow::Out => KSPIN_DATAFLOW_OUT,
    }
}

const fn communication(comm: Communication) -> i32 {
    match comm {
        Communication::None => KSPIN_COMMUNICATION_NONE,
        Communication::Sink => KSPIN_COMMUNICATION_SINK,
        Communication::Source => KSPIN_COMMUNICATION_SOURCE,
        Communication::Both => KSPIN_COMMUNICATION_BOTH,
        Communication::Bridge => KSPIN_COMMUNICATION_BRIDGE,
    }
}

const fn pin(
    pin: &PinDescriptor,
    ranges: &'static [*const KsDataRange],
    category: *const GUID,
) -> KsPinDescriptorEx {
    KsPinDescriptorEx {
        Dispatch: ptr::null(),
        AutomationTable: ptr::null(),
        PinDescriptor: KsPinDescriptor {
            InterfacesCount: 0,
            Interfaces: ptr::null(),
            MediumsCount: 0,
            Mediums: ptr::null(),
            DataRangesCount: ranges.len() as u32,
            DataRanges: ranges.as_ptr(),
            DataFlow: data_flow(pin.data_flow),
            Communication: communication(pin.communication),
            Category: category,
            Name: ptr::null(),
            ConstrainedDataRangesCount: 0,
            ConstrainedDataRanges: ptr::null(),
        },
        Flags: 0,
        InstancesPossible: pin.instances_possible,
        InstancesNecessary: pin.instances_necessary,
        AllocatorFraming: ptr::null(),
        IntersectHandler: ptr::null(),
    }
}

/*──────────────────────── the descriptor ────────────────────────────────*/

const CAPTURE: PinDescriptor = MIC_PINS[0];
const BRIDGE: PinDescriptor = MIC_PINS[1];

// The statics below are laid out for exactly this shape.
const _: () = assert!(MIC_PINS.len() == 2);
const _: () = assert!(CAPTURE.data_ranges.len() == 1 && BRIDGE.data_ranges.len() == 1);

static CATEGORIES: KsStatic<[GUID; MIC_CATEGORIES.len()]> = KsStatic(guids(&MIC_CATEGORIES));
static PIN_CATEGORIES: KsStatic<[GUID; 2]> =
    KsStatic([guid(CAPTURE.category), guid(BRIDGE.category)]);
static REFERENCE: KsStatic<GUID> = KsStatic(guid(guids::MICDROP_FILTER));

static CAPTURE_RANGE: KsStatic<KsDataRangeAudio> = KsStatic(audio_range(&CAPTURE.data_ranges[0]));
static BRIDGE_RANGE: KsStatic<KsDataRangeAudio> = KsStatic(audio_range(&BRIDGE.data_ranges[0]));

static CAPTURE_RANGES: KsStatic<[*const KsDataRange; 1]> =
    KsStatic([&CAPTURE_RANGE.0.DataRange as *const KsDataRange]);
static BRIDGE_RANGES: KsStatic<[*const KsDataRange; 1]> =
    KsStatic([&BRIDGE_RANGE.0.DataRange as *const KsDataRange]);

static PINS: KsStatic<[KsPinDescriptorEx; 2]> = KsStatic([
    pin(&CAPTURE, &CAPTURE_RANGES.0, &PIN_CATEGORIES.0[0]),
    pin(&BRIDGE, &BRIDGE_RANGES.0, &PIN_CATEGORIES.0[1]),
]);

/// Passed by reference to `KsCreateFilterFactory`; never copied or mutated.
pub static FILTER_DESCRIPTOR: KsStatic<KsFilterDescriptor> = KsStatic(KsFilterDescriptor {
    Dispatch: ptr::null(),
    AutomationTable: ptr::null(),
    Version: KSFILTER_DESCRIPTOR_VERSION,
    Flags: 0,
    ReferenceGuid: &REFERENCE.0,
    PinDescriptorsCount: 2,
    PinDescriptorSize: mem::size_of::<KsPinDescriptorEx>() as u32,
    PinDescriptors: &PINS.0 as *const KsPinDescriptorEx,
    CategoriesCount: MIC_CATEGORIES.len() as u32,
    Categories: &CATEGORIES.0 as *const GUID,
    NodeDescriptorsCount: 0,
    NodeDescriptorSize: 0,
    NodeDescriptors: ptr::null(),
    ConnectionsCount: 0,
    Connections: ptr::null(),
    ComponentId: ptr::null(),
});
