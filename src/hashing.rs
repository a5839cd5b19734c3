//! Content-addressed hashing for `processed_files` deduplication. A deterministic function of raw bytes; a 16-byte digest, stored
//! as `BYTEA` and mirrored in the in-memory dedup set as `[u8; 16]`.

pub const HASH_LEN: usize = 16;

pub type ContentHash = [u8; HASH_LEN];

/// BLAKE3 over the raw bytes, truncated from its 32-byte output to 16
/// bytes, which is still effectively collision-free at corpus scale and
/// keeps the stored column small.
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    let full = blake3::hash(bytes);
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&full.as_bytes()[..HASH_LEN]);
    out
}

pub fn hash_to_hex(hash: &ContentHash) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = content_hash(b"fn main() {}");
        let b = content_hash(b"fn main() {}");
        assert_eq!(a, b);
    }

    #[test]
    fn distinguishes_different_content() {
        let a = content_hash(b"fn main() {}");
        let b = content_hash(b"fn main() {} ");
        assert_ne!(a, b);
    }

    #[test]
    fn hex_roundtrip_length() {
        let h = content_hash(b"hello world");
        let hex = hash_to_hex(&h);
        assert_eq!(hex.len(), HASH_LEN * 2);
    }
}
