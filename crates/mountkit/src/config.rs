//! Detection and table-reading configuration.

use std::path::PathBuf;

use mountkit_common::ProcPaths;

/// Default bound on mount table reads when a path is not found.
///
/// Chosen empirically. It limits the cost of the race workaround under heavy
/// mount churn; it does not guarantee a complete read.
pub const DEFAULT_MAX_TABLE_READS: usize = 3;

/// Mount detection options.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Where the mount table files live.
    pub proc: ProcPaths,
    /// Maximum reads of the table before accepting "not mounted".
    pub max_table_reads: usize,
    /// Try the cross-device open probe (Linux 5.6+).
    pub open_probe: bool,
    /// Try the device number comparison.
    pub device_probe: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            proc: ProcPaths::new(),
            max_table_reads: DEFAULT_MAX_TABLE_READS,
            open_probe: true,
            device_probe: true,
        }
    }
}

impl MountConfig {
    /// Set the procfs root.
    #[must_use]
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc = ProcPaths::with_root(root);
        self
    }

    /// Set the table read bound. Values below one are treated as one.
    #[must_use]
    pub fn with_max_table_reads(mut self, reads: usize) -> Self {
        self.max_table_reads = reads.max(1);
        self
    }

    /// Skip the cross-device open probe.
    #[must_use]
    pub fn without_open_probe(mut self) -> Self {
        self.open_probe = false;
        self
    }

    /// Skip the device number comparison.
    #[must_use]
    pub fn without_device_probe(mut self) -> Self {
        self.device_probe = false;
        self
    }

    /// Go straight to the mount table.
    #[must_use]
    pub fn table_only(self) -> Self {
        self.without_open_probe().without_device_probe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MountConfig::default();
        assert!(config.proc.is_default());
        assert_eq!(config.max_table_reads, 3);
        assert!(config.open_probe);
        assert!(config.device_probe);
    }

    #[test]
    fn builder_pattern() {
        let config = MountConfig::default()
            .with_proc_root("/custom/proc")
            .with_max_table_reads(0)
            .table_only();

        assert_eq!(config.proc.root, PathBuf::from("/custom/proc"));
        assert_eq!(config.max_table_reads, 1);
        assert!(!config.open_probe);
        assert!(!config.device_probe);
    }
}
