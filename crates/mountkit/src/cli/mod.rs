//! CLI command definitions and handlers.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use mountkit_common::MountResult;

use crate::config::{DEFAULT_MAX_TABLE_READS, MountConfig};
use crate::filesystem;
use crate::mounted::MountDetector;
use crate::mountinfo::{
    FilterDecision, FsTypeFilter, LiveMountTable, MountFilter, MountInfo, MountTable,
    PidMountTable, PrefixFilter, SingleEntryFilter, list_mounts_from_reader,
};

/// Mountkit - inspect and tear down mounts
#[derive(Parser)]
#[command(name = "mountkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Where procfs is mounted
    #[arg(long, global = true, default_value = "/proc")]
    pub proc_root: PathBuf,

    /// Maximum mount table reads before accepting "not mounted"
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_TABLE_READS)]
    pub table_reads: usize,

    /// Stop waiting after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for `list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab separated columns.
    #[default]
    Table,
    /// Pretty-printed JSON array.
    Json,
}

/// Mountkit commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List mounts
    List {
        /// Only mounts at or under this path
        #[arg(long, conflicts_with = "exact")]
        prefix: Option<PathBuf>,

        /// Only the first mount exactly at this path
        #[arg(long)]
        exact: Option<PathBuf>,

        /// Only mounts of this filesystem type (repeatable)
        #[arg(long = "fstype")]
        fs_types: Vec<String>,

        /// Read the mount namespace of this process
        #[arg(long, conflicts_with = "input")]
        pid: Option<u32>,

        /// Parse a mountinfo file instead of the live table
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Check whether a path is a mount point
    Check {
        /// Path to check
        path: PathBuf,

        /// Only use the cheap probes, never read the mount table
        #[arg(long)]
        fast: bool,
    },

    /// Lazily unmount a filesystem
    Umount {
        /// Mount point
        target: PathBuf,

        /// Also unmount everything mounted below the target
        #[arg(short, long)]
        recursive: bool,
    },

    /// Mount a filesystem
    Mount {
        /// Device, directory or pseudo source
        source: String,

        /// Mount point
        target: PathBuf,

        /// Filesystem type
        #[arg(short = 't', long = "type", default_value = "none")]
        fs_type: String,

        /// Comma separated mount options
        #[arg(short, long, default_value = "")]
        options: String,
    },
}

/// Every filter must keep an entry; any filter may end the scan once the
/// entry is kept.
struct AllOf(Vec<Box<dyn MountFilter + Send>>);

impl MountFilter for AllOf {
    fn decide(&self, info: &MountInfo) -> FilterDecision {
        let combined = self
            .0
            .iter()
            .fold(FilterDecision::KEEP, |acc, filter| {
                let decision = filter.decide(info);
                FilterDecision {
                    skip: acc.skip || decision.skip,
                    stop: acc.stop || decision.stop,
                }
            });
        if combined.skip {
            FilterDecision::SKIP
        } else {
            combined
        }
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = MountConfig::default()
            .with_proc_root(self.proc_root)
            .with_max_table_reads(self.table_reads);
        let timeout = self.timeout.map(Duration::from_secs);

        let output = match self.command {
            Commands::List {
                prefix,
                exact,
                fs_types,
                pid,
                input,
                format,
            } => {
                let mut filters: Vec<Box<dyn MountFilter + Send>> = Vec::new();
                if let Some(prefix) = prefix {
                    filters.push(Box::new(PrefixFilter::new(std::path::absolute(prefix)?)));
                }
                if let Some(exact) = exact {
                    filters.push(Box::new(SingleEntryFilter::new(std::path::absolute(exact)?)));
                }
                if !fs_types.is_empty() {
                    filters.push(Box::new(FsTypeFilter::new(fs_types)));
                }
                let filter = AllOf(filters);

                let mounts = run_blocking(timeout, move || {
                    let filter: Option<&dyn MountFilter> = Some(&filter);
                    match (input, pid) {
                        (Some(input), _) => {
                            let file = File::open(&input)?;
                            list_mounts_from_reader(BufReader::new(file), filter)
                        }
                        (None, Some(pid)) => {
                            PidMountTable::with_paths(pid, config.proc).mounts(filter)
                        }
                        (None, None) => LiveMountTable::with_paths(config.proc).mounts(filter),
                    }
                })
                .await?;

                match format {
                    OutputFormat::Json => serde_json::to_string_pretty(&mounts)?,
                    OutputFormat::Table => render_table(&mounts),
                }
            }

            Commands::Check { path, fast } => {
                let detector = MountDetector::with_config(config);
                if fast {
                    let detection = run_blocking(timeout, move || detector.is_mounted_fast(path)).await?;
                    match (detection.mounted, detection.certain) {
                        (true, _) => "mounted".to_string(),
                        (false, true) => "not mounted".to_string(),
                        (false, false) => "not mounted (uncertain)".to_string(),
                    }
                } else if run_blocking(timeout, move || detector.is_mounted(path)).await? {
                    "mounted".to_string()
                } else {
                    "not mounted".to_string()
                }
            }

            Commands::Umount { target, recursive } => {
                let display = target.display().to_string();
                if recursive {
                    let table = LiveMountTable::with_paths(config.proc);
                    run_blocking(timeout, move || {
                        filesystem::recursive_unmount_with(&target, &table, filesystem::detach)
                    })
                    .await?;
                } else {
                    run_blocking(timeout, move || filesystem::unmount(&target)).await?;
                }
                format!("unmounted {display}")
            }

            Commands::Mount {
                source,
                target,
                fs_type,
                options,
            } => {
                let message = format!("mounted {source} on {}", target.display());
                run_blocking(timeout, move || {
                    filesystem::mount(&source, &target, &fs_type, &options)
                })
                .await?;
                message
            }
        };

        println!("{output}");
        Ok(())
    }
}

/// Run a blocking mount operation off the async workers.
///
/// On timeout the wait is abandoned; the kernel call itself cannot be
/// cancelled and keeps running on its thread.
async fn run_blocking<T, F>(timeout: Option<Duration>, op: F) -> Result<T>
where
    F: FnOnce() -> MountResult<T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(op);
    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| eyre!("operation did not finish within {}s", limit.as_secs()))?,
        None => task.await,
    };
    Ok(joined??)
}

fn render_table(mounts: &[MountInfo]) -> String {
    let mut out = String::from("ID\tPARENT\tDEVICE\tFSTYPE\tSOURCE\tMOUNTPOINT\tOPTIONS");
    for m in mounts {
        let _ = write!(
            out,
            "\n{}\t{}\t{}:{}\t{}\t{}\t{}\t{}",
            m.id,
            m.parent,
            m.major,
            m.minor,
            m.fs_type,
            m.source,
            m.mountpoint.display(),
            m.options
        );
    }
    out
}
