//! Fixed-size UTF-16 output buffers (`String128`).

/// Number of UTF-16 code units in a [`String128`], including the terminator.
pub const STRING128_LEN: usize = 128;

/// Caller-supplied output buffer used by name getters.
pub type String128 = [u16; STRING128_LEN];

/// Copy `units` into `dest` the way a genuine getter fills its buffer.
///
/// At most 127 units are copied so there is always room for the NUL
/// terminator; every unit after the terminator is zeroed.
pub fn write_string128(dest: &mut String128, units: &[u16]) {
    let len = units.len().min(STRING128_LEN - 1);
    dest[..len].copy_from_slice(&units[..len]);
    dest[len..].fill(0);
}

/// Read a NUL-terminated [`String128`] into an owned string.
///
/// Unpaired surrogates are replaced, since the buffer came from foreign code.
pub fn read_string128(src: &String128) -> String {
    let len = src.iter().position(|&unit| unit == 0).unwrap_or(STRING128_LEN);
    String::from_utf16_lossy(&src[..len])
}
