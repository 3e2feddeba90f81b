/// Sources shorter than this run as a single partition by default.
pub const DEFAULT_MIN_PARTITION_LEN: usize = 64;

/// Configuration for parallel evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Number of partitions a bounded source is split into.
    pub partitions: usize,
    /// Sources shorter than this are evaluated as one partition.
    pub min_partition_len: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            partitions: rayon::current_num_threads(),
            min_partition_len: DEFAULT_MIN_PARTITION_LEN,
        }
    }
}

impl Options {
    pub fn set_partitions(&mut self, partitions: usize) {
        self.partitions = partitions;
    }

    pub fn set_min_partition_len(&mut self, min_partition_len: usize) {
        self.min_partition_len = min_partition_len;
    }

    /// Number of partitions to use for a source of `len` elements, at least 1.
    pub fn partition_count(&self, len: usize) -> usize {
        if len < self.min_partition_len {
            1
        } else {
            self.partitions.clamp(1, len.max(1))
        }
    }
}
