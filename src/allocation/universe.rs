use serde::Serialize;

/// The contiguous range of partition identifiers a zone can hold.
///
/// The solver works on local ids `0..count`; external ids are `base..base + count`. When a
/// prior allocation exists, `base` is its smallest identifier so existing numbering survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionUniverse {
    base: u32,
    count: usize,
}

impl PartitionUniverse {
    /// `count = zone_capacity / replication_factor`.
    pub fn new(zone_capacity: usize, replication_factor: usize, smallest_existing: Option<u32>) -> Self {
        let count = zone_capacity.checked_div(replication_factor).unwrap_or(0);
        Self {
            base: smallest_existing.unwrap_or(0),
            count,
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn contains(&self, id: u32) -> bool {
        self.to_local(id).is_some()
    }

    pub fn to_local(&self, id: u32) -> Option<usize> {
        let offset = id.checked_sub(self.base)? as usize;
        (offset < self.count).then_some(offset)
    }

    pub fn to_external(&self, local: usize) -> u32 {
        self.base + local as u32
    }
}
