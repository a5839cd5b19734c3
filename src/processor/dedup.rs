//! In-memory dedup set shared by every worker in a process.
//! An exact `DashSet` rather than a probabilistic filter — acceptable at
//! this corpus's scale, and it lets batch rollback remove precisely the
//! hashes a failed batch speculatively added.

use dashmap::DashSet;

use crate::hashing::ContentHash;

pub struct DedupSet {
    hashes: DashSet<ContentHash>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self { hashes: DashSet::new() }
    }

    pub fn from_known(known: Vec<ContentHash>) -> Self {
        let hashes = DashSet::new();
        for hash in known {
            hashes.insert(hash);
        }
        Self { hashes }
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.hashes.contains(hash)
    }

    /// Returns `true` if this is the first time `hash` has been seen.
    pub fn insert(&self, hash: ContentHash) -> bool {
        self.hashes.insert(hash)
    }

    /// Undoes a speculative insert after a failed batch.
    pub fn remove(&self, hash: &ContentHash) {
        self.hashes.remove(hash);
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_succeeds_second_is_duplicate() {
        let set = DedupSet::new();
        let hash: ContentHash = [1u8; 16];
        assert!(set.insert(hash));
        assert!(!set.insert(hash));
    }

    #[test]
    fn rollback_removes_speculative_hash() {
        let set = DedupSet::new();
        let hash: ContentHash = [2u8; 16];
        set.insert(hash);
        set.remove(&hash);
        assert!(!set.contains(&hash));
    }

    #[test]
    fn bootstraps_from_known_hashes() {
        let known = vec![[3u8; 16], [4u8; 16]];
        let set = DedupSet::from_known(known);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&[3u8; 16]));
    }
}
