//! Capability descriptor of the virtual microphone.
//!
//! This is the platform-neutral model of a `KSFILTER_DESCRIPTOR`: filter
//! categories, pins and the audio data ranges each pin accepts. The kernel
//! driver lowers [`MIC_CAPTURE_FILTER`] into the KS binary layout at compile
//! time; user-mode code inspects it directly.
//!
//! The descriptor is a `static`: it is referenced, never copied, by the
//! registration call, and nothing in the crate can mutate it.

use core::fmt;

/*──────────────────────────────── GUID ──────────────────────────────────*/

/// A COM-style GUID with the Windows field split.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Build from the 128-bit value as written in registry format.
    pub const fn from_u128(v: u128) -> Self {
        let tail = v as u64;
        Self {
            data1: (v >> 96) as u32,
            data2: (v >> 80) as u16,
            data3: (v >> 64) as u16,
            data4: tail.to_be_bytes(),
        }
    }

    pub const fn to_u128(self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | u64::from_be_bytes(self.data4) as u128
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Well-known kernel-streaming GUIDs (`ks.h`, `ksmedia.h`).
pub mod guids {
    use super::Guid;

    pub const KSCATEGORY_AUDIO: Guid = Guid::from_u128(0x6994AD04_93EF_11D0_A3CC_00A0C9223196);
    pub const KSCATEGORY_CAPTURE: Guid = Guid::from_u128(0x65E8773D_8F56_11D0_A3B9_00A0C9223196);

    pub const KSDATAFORMAT_TYPE_AUDIO: Guid =
        Guid::from_u128(0x73647561_0000_0010_8000_00AA00389B71);
    pub const KSDATAFORMAT_SUBTYPE_PCM: Guid =
        Guid::from_u128(0x00000001_0000_0010_8000_00AA00389B71);
    pub const KSDATAFORMAT_SPECIFIER_WAVEFORMATEX: Guid =
        Guid::from_u128(0x05589F81_C356_11CE_BF01_00AA0055595A);

    pub const PINNAME_CAPTURE: Guid = Guid::from_u128(0xFB6C4281_0353_11D1_905F_0000C0CC16BA);
    pub const KSNODETYPE_MICROPHONE: Guid =
        Guid::from_u128(0xDFF21BE1_F70F_11D0_B917_00A0C9223196);

    /// Reference GUID of the micdrop capture filter.
    pub const MICDROP_FILTER: Guid = Guid::from_u128(0x3F1D6C9A_5B2E_4C7D_9A1E_6D2B8F4C0A17);
}

/*──────────────────────────── pin model ─────────────────────────────────*/

/// Direction of data across a pin, seen from the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFlow {
    In,
    Out,
}

/// Which side of a connection a pin may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Communication {
    None,
    Sink,
    Source,
    Both,
    Bridge,
}

/// A `KSDATARANGE_AUDIO`: the PCM formats a pin is willing to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioDataRange {
    pub major_format: Guid,
    pub sub_format: Guid,
    pub specifier: Guid,
    pub max_channels: u32,
    pub min_bits_per_sample: u32,
    pub max_bits_per_sample: u32,
    pub min_sample_frequency: u32,
    pub max_sample_frequency: u32,
}

impl AudioDataRange {
    pub const fn is_well_formed(&self) -> bool {
        self.max_channels > 0
            && self.min_bits_per_sample > 0
            && self.min_bits_per_sample <= self.max_bits_per_sample
            && self.min_sample_frequency > 0
            && self.min_sample_frequency <= self.max_sample_frequency
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinDescriptor {
    pub name: &'static str,
    pub category: Guid,
    pub data_flow: DataFlow,
    pub communication: Communication,
    pub instances_possible: u32,
    pub instances_necessary: u32,
    pub data_ranges: &'static [AudioDataRange],
}

impl PinDescriptor {
    pub const fn is_well_formed(&self) -> bool {
        if self.data_ranges.is_empty() || self.instances_necessary > self.instances_possible {
            return false;
        }
        let mut i = 0;
        while i < self.data_ranges.len() {
            if !self.data_ranges[i].is_well_formed() {
                return false;
            }
            i += 1;
        }
        true
    }
}

/*─────────────────────────── filter model ───────────────────────────────*/

/// Everything a device created from this driver declares it can do.
#[derive(Debug, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub name: &'static str,
    pub reference: Guid,
    pub categories: &'static [Guid],
    pub pins: &'static [PinDescriptor],
}

impl CapabilityDescriptor {
    /// At least one category, at least one pin, every pin well formed, and
    /// at least one pin streaming data out of the filter.
    pub const fn is_well_formed(&self) -> bool {
        if self.categories.is_empty() || self.pins.is_empty() {
            return false;
        }
        let mut has_output = false;
        let mut i = 0;
        while i < self.pins.len() {
            let pin = &self.pins[i];
            if !pin.is_well_formed() {
                return false;
            }
            if matches!(pin.data_flow, DataFlow::Out) {
                has_output = true;
            }
            i += 1;
        }
        has_output
    }

    pub fn has_category(&self, category: &Guid) -> bool {
        self.categories.contains(category)
    }
}

impl fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "filter {} {}", self.name, self.reference)?;
        for category in self.categories {
            writeln!(f, "  category {category}")?;
        }
        for (id, pin) in self.pins.iter().enumerate() {
            writeln!(
                f,
                "  pin {id} {:<8} {:?}/{:?} instances {}..={} category {}",
                pin.name,
                pin.data_flow,
                pin.communication,
                pin.instances_necessary,
                pin.instances_possible,
                pin.category
            )?;
            for range in pin.data_ranges {
                writeln!(
                    f,
                    "    pcm <= {} ch, {}-{} bit, {}-{} Hz",
                    range.max_channels,
                    range.min_bits_per_sample,
                    range.max_bits_per_sample,
                    range.min_sample_frequency,
                    range.max_sample_frequency
                )?;
            }
        }
        Ok(())
    }
}

/*─────────────────────── the virtual microphone ─────────────────────────*/

pub const PCM_CAPTURE_RANGE: AudioDataRange = AudioDataRange {
    major_format: guids::KSDATAFORMAT_TYPE_AUDIO,
    sub_format: guids::KSDATAFORMAT_SUBTYPE_PCM,
    specifier: guids::KSDATAFORMAT_SPECIFIER_WAVEFORMATEX,
    max_channels: 2,
    min_bits_per_sample: 16,
    max_bits_per_sample: 16,
    min_sample_frequency: 44_100,
    max_sample_frequency: 48_000,
};

/// Streams captured audio out to the client.
pub const CAPTURE_PIN: PinDescriptor = PinDescriptor {
    name: "capture",
    category: guids::PINNAME_CAPTURE,
    data_flow: DataFlow::Out,
    communication: Communication::Sink,
    instances_possible: 1,
    instances_necessary: 0,
    data_ranges: &[PCM_CAPTURE_RANGE],
};

/// Topology endpoint standing for the (non-existent) microphone capsule.
pub const BRIDGE_PIN: PinDescriptor = PinDescriptor {
    name: "bridge",
    category: guids::KSNODETYPE_MICROPHONE,
    data_flow: DataFlow::In,
    communication: Communication::None,
    instances_possible: 0,
    instances_necessary: 0,
    data_ranges: &[PCM_CAPTURE_RANGE],
};

pub const MIC_CATEGORIES: [Guid; 2] = [guids::KSCATEGORY_AUDIO, guids::KSCATEGORY_CAPTURE];
pub const MIC_PINS: [PinDescriptor; 2] = [CAPTURE_PIN, BRIDGE_PIN];

/// The one descriptor this driver ever registers.
pub static MIC_CAPTURE_FILTER: CapabilityDescriptor = CapabilityDescriptor {
    name: "micdrop virtual microphone",
    reference: guids::MICDROP_FILTER,
    categories: &MIC_CATEGORIES,
    pins: &MIC_PINS,
};

const _: () = assert!(MIC_CAPTURE_FILTER.is_well_formed());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_formats_in_registry_style() {
        assert_eq!(
            guids::KSCATEGORY_AUDIO.to_string(),
            "{6994AD04-93EF-11D0-A3CC-00A0C9223196}"
        );
        assert_eq!(guids::PINNAME_CAPTURE.data4, [0x90, 0x5F, 0x00, 0x00, 0xC0, 0xCC, 0x16, 0xBA]);
    }

    #[test]
    fn guid_u128_conversion_is_lossless() {
        let raw = 0xDFF21BE1_F70F_11D0_B917_00A0C9223196u128;
        assert_eq!(Guid::from_u128(raw).to_u128(), raw);
    }

    #[test]
    fn shipped_descriptor_is_well_formed() {
        assert!(MIC_CAPTURE_FILTER.is_well_formed());
        assert!(MIC_CAPTURE_FILTER.has_category(&guids::KSCATEGORY_CAPTURE));
    }

    #[test]
    fn rejects_descriptor_without_output_pin() {
        const ONLY_BRIDGE: [PinDescriptor; 1] = [BRIDGE_PIN];
        let desc = CapabilityDescriptor {
            name: "bridge only",
            reference: guids::MICDROP_FILTER,
            categories: &MIC_CATEGORIES,
            pins: &ONLY_BRIDGE,
        };
        assert!(!desc.is_well_formed());
    }

    #[test]
    fn rejects_inverted_ranges() {
        let mut range = PCM_CAPTURE_RANGE;
        range.min_sample_frequency = 96_000;
        assert!(!range.is_well_formed());

        let mut pin = CAPTURE_PIN;
        pin.instances_necessary = 2;
        assert!(!pin.is_well_formed());
    }
}
