use serde::{Deserialize, Serialize};

/// Usage accumulator.
///
/// Every counter is cumulative and only ever grows while the tracker is alive. Values are
/// derived from registry mutations; nothing here is tracked independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Fresh allocations (allocate, zero_allocate, resize of an untracked block).
    pub allocations: u64,
    /// Bytes charged by fresh allocations.
    pub allocated_bytes: u64,
    /// Resizes of tracked blocks.
    pub resizes: u64,
    /// Net growth charged by resizes of tracked blocks. Shrinking never subtracts.
    pub resize_growth_bytes: u64,
    pub releases: u64,
    /// Sum of block sizes at the time of each release.
    pub released_bytes: u64,
    /// Releases of a block that was already released. Also counted in `releases`.
    pub double_releases: u64,
    pub largest_block: Option<u64>,
    pub smallest_block: Option<u64>,
}

impl UsageStats {
    pub const fn new() -> Self {
        Self {
            allocations: 0,
            allocated_bytes: 0,
            resizes: 0,
            resize_growth_bytes: 0,
            releases: 0,
            released_bytes: 0,
            double_releases: 0,
            largest_block: None,
            smallest_block: None,
        }
    }

    /// Fresh allocations plus resize growth.
    pub fn total_charged_bytes(&self) -> u64 {
        self.allocated_bytes.saturating_add(self.resize_growth_bytes)
    }

    pub(crate) fn record_allocation(&mut self, size: usize) {
        self.allocations = self.allocations.saturating_add(1);
        self.allocated_bytes = self.allocated_bytes.saturating_add(size as u64);
        self.observe_block(size);
    }

    pub(crate) fn record_resize(&mut self, old_size: usize, new_size: usize) {
        self.resizes = self.resizes.saturating_add(1);
        let growth = new_size.saturating_sub(old_size) as u64;
        self.resize_growth_bytes = self.resize_growth_bytes.saturating_add(growth);
        self.observe_block(new_size);
    }

    pub(crate) fn record_release(&mut self, size: usize, already_released: bool) {
        self.releases = self.releases.saturating_add(1);
        self.released_bytes = self.released_bytes.saturating_add(size as u64);
        if already_released {
            self.double_releases = self.double_releases.saturating_add(1);
        }
    }

    fn observe_block(&mut self, size: usize) {
        let size = size as u64;
        self.largest_block = Some(self.largest_block.map_or(size, |max| max.max(size)));
        self.smallest_block = Some(self.smallest_block.map_or(size, |min| min.min(size)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_accumulate() {
        let mut stats = UsageStats::new();
        stats.record_allocation(100);
        stats.record_allocation(40);

        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.allocated_bytes, 140);
        assert_eq!(stats.largest_block, Some(100));
        assert_eq!(stats.smallest_block, Some(40));
    }

    #[test]
    fn test_resize_charges_only_net_growth() {
        let mut stats = UsageStats::new();
        stats.record_allocation(40);
        stats.record_resize(40, 100);
        stats.record_resize(100, 10);

        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.resizes, 2);
        assert_eq!(stats.resize_growth_bytes, 60);
        assert_eq!(stats.total_charged_bytes(), 100);
        assert_eq!(stats.largest_block, Some(100));
        assert_eq!(stats.smallest_block, Some(10));
    }

    #[test]
    fn test_double_release_is_recounted_and_flagged() {
        let mut stats = UsageStats::new();
        stats.record_release(64, false);
        stats.record_release(64, true);

        assert_eq!(stats.releases, 2);
        assert_eq!(stats.released_bytes, 128);
        assert_eq!(stats.double_releases, 1);
    }

    #[test]
    fn test_empty_stats_have_no_extrema() {
        let stats = UsageStats::default();
        assert_eq!(stats, UsageStats::new());
        assert_eq!(stats.largest_block, None);
        assert_eq!(stats.total_charged_bytes(), 0);
    }
}
