use clap::{Args, Subcommand};

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List a record's audit history
    History(HistoryArgs),

    /// Show one audit record
    Show {
        /// Audit record id (aud-<16 hex>)
        id: String,
    },

    /// Reconstruct a record's attributes at a past point
    Revision(RevisionArgs),

    /// List every tracked target type
    Types,

    /// List the records appended under one request id
    Request {
        /// Request correlation id (req-...)
        request_id: String,
    },

    /// Rebuild the store from the JSONL trail
    Rebuild {
        /// Trail directory (defaults to store.trail_dir)
        #[arg(long)]
        trail_dir: Option<String>,
    },
}

/// Target identity shared by history and revision.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Target type, e.g. Widget
    pub target_type: String,

    /// Target id
    pub target_id: String,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Only this action: create, update, delete (or creates, updates, destroys)
    #[arg(long)]
    pub action: Option<String>,

    /// Lowest version to include
    #[arg(long)]
    pub from_version: Option<i64>,

    /// Highest version to include
    #[arg(long)]
    pub to_version: Option<i64>,

    /// Only records at or before this RFC 3339 timestamp
    #[arg(long)]
    pub until: Option<String>,

    /// Newest first
    #[arg(long)]
    pub desc: bool,
}

#[derive(Debug, Args)]
pub struct RevisionArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// State as of this version
    #[arg(long, conflicts_with_all = ["at", "all"])]
    pub to_version: Option<i64>,

    /// State as of this RFC 3339 timestamp
    #[arg(long, conflicts_with = "all")]
    pub at: Option<String>,

    /// Every intermediate state, one per record
    #[arg(long)]
    pub all: bool,
}
