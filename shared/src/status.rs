//! `NTSTATUS` as a value type.
//!
//! The host speaks raw 32-bit status codes. They travel through the lifecycle
//! untouched: whatever the host returned is what `DriverEntry` hands back.

use core::fmt;

/// A raw NT status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NtStatus(i32);

impl NtStatus {
    pub const SUCCESS: Self = Self(0);
    pub const UNSUCCESSFUL: Self = Self::from_bits(0xC000_0001);
    pub const NOT_IMPLEMENTED: Self = Self::from_bits(0xC000_0002);
    pub const INVALID_PARAMETER: Self = Self::from_bits(0xC000_000D);
    pub const INSUFFICIENT_RESOURCES: Self = Self::from_bits(0xC000_009A);
    pub const INVALID_DEVICE_STATE: Self = Self::from_bits(0xC000_0184);

    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Build from the unsigned spelling used in headers and debugger output.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits as i32)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    /// `NT_SUCCESS`: success and informational codes are non-negative,
    /// warnings and errors are not.
    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// `Ok(())` when [`is_success`](Self::is_success), otherwise the code itself.
    #[inline]
    pub const fn into_result(self) -> Result<(), NtStatus> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.bits())
    }
}

impl fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NtStatus(0x{:08X})", self.bits())
    }
}

impl From<i32> for NtStatus {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl From<NtStatus> for i32 {
    fn from(status: NtStatus) -> Self {
        status.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_negative() {
        assert!(!NtStatus::UNSUCCESSFUL.is_success());
        assert_eq!(NtStatus::UNSUCCESSFUL.raw(), -1_073_741_823);
        assert_eq!(NtStatus::from_raw(-1_073_741_823).bits(), 0xC000_0001);
    }

    #[test]
    fn informational_codes_count_as_success() {
        // STATUS_PENDING, STATUS_OBJECT_NAME_EXISTS
        assert!(NtStatus::from_bits(0x0000_0103).is_success());
        assert!(NtStatus::from_bits(0x4000_0000).into_result().is_ok());
        // STATUS_BUFFER_OVERFLOW is a warning
        assert_eq!(
            NtStatus::from_bits(0x8000_0005).into_result(),
            Err(NtStatus::from_bits(0x8000_0005))
        );
    }

    #[test]
    fn renders_like_the_debugger() {
        assert_eq!(NtStatus::NOT_IMPLEMENTED.to_string(), "0xC0000002");
        assert_eq!(format!("{:?}", NtStatus::SUCCESS), "NtStatus(0x00000000)");
    }
}
