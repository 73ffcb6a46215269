/// Modulo-256 sum of `data`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte))
}

/// Check that the last byte of `frame` is the checksum of the bytes before it.
///
/// An empty slice has no checksum byte and never verifies.
pub fn verify(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((last, data)) => checksum(data) == *last,
        None => false,
    }
}
