//! BLAKE3 hashing

/// Compute the BLAKE3 hash of data
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}
