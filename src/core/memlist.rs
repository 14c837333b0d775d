//! Memory list accounting and the privileged-call seam
//!
//! The kernel exposes page-list counters through a rights-gated
//! system-information channel. This module defines the platform-neutral
//! view of that data plus the [`MemoryListOps`] trait the monitor core is
//! written against; the resolved ntdll capability implements it on Windows
//! and test doubles implement it everywhere else.

use std::fmt;

/// Status code returned by the privileged memory-list calls.
///
/// Zero means success; any other value is an OS-defined failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtStatus(pub i32);

impl NtStatus {
    pub const SUCCESS: NtStatus = NtStatus(0);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0 as u32)
    }
}

/// Raw page counts from one memory list query.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryListCounts {
    pub zero_page_count: u64,
    pub free_page_count: u64,
    pub modified_page_count: u64,
    pub modified_no_write_page_count: u64,
    pub bad_page_count: u64,
    /// Standby pages, bucketed by reclaim priority.
    pub page_count_by_priority: [u64; 8],
    pub repurposed_pages_by_priority: [u64; 8],
    pub standby_repurposed_by_priority: [u64; 8],
}

/// Effective free and standby memory derived from one query.
///
/// Produced fresh each tick and discarded after the decision; no history
/// is kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySnapshot {
    pub free_bytes: u64,
    pub standby_bytes: u64,
}

impl MemorySnapshot {
    /// Derive a snapshot from raw page counts and the hardware page size.
    ///
    /// Effective free memory counts both free and zeroed pages; standby
    /// memory sums the per-priority standby buckets.
    pub fn from_counts(counts: &MemoryListCounts, page_size: u64) -> Self {
        let effective_free_pages = counts.free_page_count + counts.zero_page_count;
        let standby_pages: u64 = counts.page_count_by_priority.iter().sum();

        Self {
            free_bytes: effective_free_pages * page_size,
            standby_bytes: standby_pages * page_size,
        }
    }

    pub fn free_mb(&self) -> f64 {
        self.free_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn standby_mb(&self) -> f64 {
        self.standby_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// The memory list query returned a nonzero status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeError {
    pub status: NtStatus,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory list query failed: status {}", self.status)
    }
}

impl std::error::Error for ProbeError {}

/// The standby purge request returned a nonzero status.
///
/// After the startup privilege check has passed, this is treated as
/// transient; at startup it means the process is not elevated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeError {
    pub status: NtStatus,
}

impl fmt::Display for PurgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "standby list purge failed: status {}", self.status)
    }
}

impl std::error::Error for PurgeError {}

/// Privileged memory-list operations.
///
/// On Windows this is backed by the entry points resolved from ntdll at
/// startup. Only one thread ever calls these; the trait still requires
/// `Send + Sync` so the monitor can be handed to a worker thread.
pub trait MemoryListOps: Send + Sync {
    /// Query the kernel's page-list accounting.
    fn query_memory_list(&self) -> Result<MemoryListCounts, ProbeError>;

    /// Ask the kernel to discard the standby page list.
    ///
    /// Purging an already-empty list is a harmless no-op that succeeds.
    fn purge_standby_list(&self) -> Result<(), PurgeError>;
}

/// Take one memory snapshot through the capability.
///
/// Partial output from a failed query is never used.
pub fn probe(ops: &dyn MemoryListOps, page_size: u64) -> Result<MemorySnapshot, ProbeError> {
    let counts = ops.query_memory_list()?;
    Ok(MemorySnapshot::from_counts(&counts, page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_SIZE: u64 = 4096;

    #[test]
    fn test_snapshot_combines_free_and_zero_pages() {
        let counts = MemoryListCounts {
            free_page_count: 100,
            zero_page_count: 28,
            ..Default::default()
        };

        let snapshot = MemorySnapshot::from_counts(&counts, PAGE_SIZE);

        assert_eq!(snapshot.free_bytes, 128 * PAGE_SIZE);
        assert_eq!(snapshot.standby_bytes, 0);
        assert!((snapshot.free_mb() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_sums_standby_priorities() {
        let mut counts = MemoryListCounts::default();
        counts.page_count_by_priority = [1, 2, 3, 4, 5, 6, 7, 8];

        let snapshot = MemorySnapshot::from_counts(&counts, PAGE_SIZE);

        assert_eq!(snapshot.standby_bytes, 36 * PAGE_SIZE);
    }

    #[test]
    fn test_snapshot_holds_at_terabyte_scale() {
        // 4 TiB of free pages must not overflow the byte math.
        let counts = MemoryListCounts {
            free_page_count: (4u64 << 40) / PAGE_SIZE,
            ..Default::default()
        };

        let snapshot = MemorySnapshot::from_counts(&counts, PAGE_SIZE);

        assert_eq!(snapshot.free_bytes, 4u64 << 40);
        assert!((snapshot.free_mb() - 4_194_304.0).abs() < 1e-6);
    }

    #[test]
    fn test_status_formats_as_hex() {
        assert_eq!(NtStatus(0xC000_0004u32 as i32).to_string(), "0xC0000004");
        assert_eq!(NtStatus(0).to_string(), "0x00000000");
        assert!(NtStatus::SUCCESS.is_success());
        assert!(!NtStatus(0xC000_0061u32 as i32).is_success());
    }

    #[test]
    fn test_errors_carry_the_status() {
        let probe_err = ProbeError {
            status: NtStatus(0xC000_0004u32 as i32),
        };
        assert!(probe_err.to_string().contains("0xC0000004"));

        let purge_err = PurgeError {
            status: NtStatus(0xC000_0061u32 as i32),
        };
        assert!(purge_err.to_string().contains("0xC0000061"));
    }
}
