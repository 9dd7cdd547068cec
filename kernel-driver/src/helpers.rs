extern crate alloc;

use alloc::string::String;
use core::slice;
use wdk_sys::UNICODE_STRING;

/// Convert a `UNICODE_STRING*` to a Rust `String`.
///
/// # Safety
/// `uni` must be null or a valid, initialised pointer from the kernel.
pub unsafe fn uni_to_string(uni: *const UNICODE_STRING) -> String {
    if uni.is_null() {
        return String::new();
    }
    // SAFETY: caller guarantees pointer validity.
    let u = unsafe { &*uni };
    if u.Buffer.is_null() {
        return String::new();
    }
    let len = (u.Length / 2) as usize;
    // SAFETY: buffer points to `len` UTF‑16 code units.
    let buf = unsafe { slice::from_raw_parts(u.Buffer, len) };
    String::from_utf16_lossy(buf)
}
