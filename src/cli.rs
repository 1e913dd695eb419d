//! Command-line interface definitions for dupekeep.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! The backup file in the storage directory acts as the session: every
//! invocation restores it, runs one command and writes it back.
//!
//! # Example
//!
//! ```bash
//! # Take over the result of a scan
//! dupekeep ingest scan.json
//!
//! # Look at the groups
//! dupekeep summary --groups
//!
//! # Trash every duplicate except the first of each group
//! dupekeep resolve --mode trash --select-duplicates
//!
//! # Only near-identical videos under a given folder
//! dupekeep resolve --mode trash --select-duplicates --media video \
//!     --path-contains /media/clips --similarity-from 95
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::actions::resolve::ResolveMode;
use crate::duplicates::{GroupId, MediaKind};

/// Review and resolve duplicate media groups.
///
/// dupekeep takes the groups produced by a similarity scan, lets you rename
/// or swap members, exclude groups from future scans and remove the
/// redundant copies through the trash, permanently or by symbolic links.
#[derive(Debug, Parser)]
#[command(name = "dupekeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file to use instead of the default one
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the backup, exclusion ledger and scan database
    #[arg(long, value_name = "DIR", global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Do not write the backup after the command changes the list
    #[arg(long, global = true)]
    pub no_backup: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for dupekeep.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace the current list with a scan result (portable JSON)
    Ingest(IngestArgs),
    /// Print counters and, optionally, the groups
    Summary(SummaryArgs),
    /// Hide a group now and in every future scan
    Exclude(ExcludeArgs),
    /// Rename one file of the list
    Rename(RenameArgs),
    /// Exchange the names of two files
    Swap(SwapArgs),
    /// Remove the checked files from the list and, depending on the mode, from disk
    Resolve(ResolveArgs),
    /// Write the list as portable JSON
    Export(ExportArgs),
    /// Replace the list with a portable JSON file
    Import(ImportArgs),
}

/// Arguments for the ingest subcommand.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Scan result in portable JSON form
    #[arg(value_name = "SCAN_JSON")]
    pub scan_json: PathBuf,

    /// Discard the current list without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the summary subcommand.
#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// List every group with its members
    #[arg(short, long)]
    pub groups: bool,

    /// Print the counters as JSON
    #[arg(long, conflicts_with = "groups")]
    pub json: bool,
}

/// Arguments for the exclude subcommand.
#[derive(Debug, Args)]
pub struct ExcludeArgs {
    /// Group identifier as shown by `summary --groups`
    #[arg(value_name = "GROUP_ID")]
    pub group: GroupId,
}

/// Arguments for the rename subcommand.
#[derive(Debug, Args)]
pub struct RenameArgs {
    /// File to rename
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// New base name; the extension is kept unless --with-extension is given
    #[arg(value_name = "NEW_NAME")]
    pub new_name: String,

    /// NEW_NAME includes the extension
    #[arg(long)]
    pub with_extension: bool,

    /// Replace an existing file at the target without asking
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for the swap subcommand.
#[derive(Debug, Args)]
pub struct SwapArgs {
    /// First file
    #[arg(value_name = "FIRST")]
    pub first: PathBuf,

    /// Second file; when omitted, the other member of FIRST's two-file group
    #[arg(value_name = "SECOND")]
    pub second: Option<PathBuf>,
}

/// Arguments for the resolve subcommand.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// What happens to each checked file
    #[arg(short, long, value_enum, default_value = "list")]
    pub mode: ModeArg,

    /// Also blacklist each removed path so future scans skip it
    #[arg(long)]
    pub exclude: bool,

    /// Only groups with a member whose path contains this text (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub path_contains: Option<String>,

    /// Only groups with a member of this media kind
    #[arg(long, value_enum)]
    pub media: Option<MediaArg>,

    /// Lowest similarity (percent) an item may have to stay checked
    #[arg(long, value_name = "PERCENT", default_value = "0", value_parser = parse_percent)]
    pub similarity_from: f32,

    /// Highest similarity (percent) an item may have to stay checked
    #[arg(long, value_name = "PERCENT", default_value = "100", value_parser = parse_percent)]
    pub similarity_to: f32,

    /// Check this file before resolving (can be specified multiple times)
    #[arg(long = "select", value_name = "PATH")]
    pub select: Vec<PathBuf>,

    /// Check every member except the first of each group
    #[arg(long)]
    pub select_duplicates: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the export subcommand.
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Destination file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Indent the JSON
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the import subcommand.
#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Portable JSON file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Discard the current list without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Resolution mode as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Remove from the list only
    List,
    /// Move to the system trash
    Trash,
    /// Delete permanently
    Permanent,
    /// Replace with a symbolic link to a kept member of the group
    Symlink,
}

impl From<ModeArg> for ResolveMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::List => ResolveMode::ListOnly,
            ModeArg::Trash => ResolveMode::Trash,
            ModeArg::Permanent => ResolveMode::Permanent,
            ModeArg::Symlink => ResolveMode::SymlinkReplace,
        }
    }
}

/// Media kind as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaArg {
    /// Still images
    Image,
    /// Video clips
    Video,
}

impl From<MediaArg> for MediaKind {
    fn from(kind: MediaArg) -> Self {
        match kind {
            MediaArg::Image => MediaKind::Image,
            MediaArg::Video => MediaKind::Video,
        }
    }
}

/// Parse a similarity percentage.
///
/// Accepts a plain number or one with a trailing `%`, between 0 and 100.
///
/// # Examples
///
/// ```
/// use dupekeep::cli::parse_percent;
///
/// assert_eq!(parse_percent("95").unwrap(), 95.0);
/// assert_eq!(parse_percent("87.5%").unwrap(), 87.5);
/// assert!(parse_percent("101").is_err());
/// ```
/// # Errors
///
/// Returns an error if the string is empty, not a number, or outside
/// 0..=100.
pub fn parse_percent(s: &str) -> Result<f32, String> {
    let s = s.trim();
    let num_str = s.strip_suffix('%').unwrap_or(s).trim();
    if num_str.is_empty() {
        return Err("Percentage cannot be empty".to_string());
    }

    let value: f32 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if !(0.0..=100.0).contains(&value) {
        return Err(format!("Percentage must be between 0 and 100, got {value}"));
    }
    Ok(value)
}
