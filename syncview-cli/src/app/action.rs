use clap::{Args, Subcommand};
use syncview_core::{BulkAction, SortMethod, ViewStatus};

/// What to do once connected
#[derive(Subcommand, Debug, Clone)]
pub enum Action {
    /// Follow the live file list and print every change
    Watch {
        #[command(flatten)]
        view: ViewArgs,

        /// Stop after this many seconds instead of running until killed
        #[arg(long)]
        for_secs: Option<u64>,
    },
    /// Print the file list once
    List {
        #[command(flatten)]
        view: ViewArgs,

        /// Print entities as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Run a command on one file
    Command {
        #[arg(value_parser = parse_action)]
        action: BulkAction,
        name: String,
    },
    /// Run a command on many files with one request
    Bulk {
        #[arg(value_parser = parse_action)]
        action: BulkAction,

        /// Files to act on
        names: Vec<String>,

        /// Act on every listed file the action applies to
        #[arg(long, conflicts_with = "names")]
        all_eligible: bool,

        #[command(flatten)]
        view: ViewArgs,
    },
}

/// Sorting and filtering of the printed list
#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Sort order; saved for next time
    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<SortMethod>,

    /// Only files with this status
    #[arg(long, value_parser = parse_status)]
    pub status: Option<ViewStatus>,

    /// Only files whose name contains this text (case-insensitive)
    #[arg(long)]
    pub filter: Option<String>,

    /// Show sizes, rate and ETA; saved for next time
    #[arg(short, long, conflicts_with = "no_details")]
    pub details: bool,

    /// Hide sizes, rate and ETA; saved for next time
    #[arg(long)]
    pub no_details: bool,
}

impl ViewArgs {
    /// Requested detail level, `None` when neither flag was given
    pub fn show_details(&self) -> Option<bool> {
        match (self.details, self.no_details) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn parse_action(raw: &str) -> Result<BulkAction, String> {
    BulkAction::parse(raw).map_err(|e| e.to_string())
}

fn parse_sort(raw: &str) -> Result<SortMethod, String> {
    SortMethod::parse(raw).ok_or_else(|| format!("unknown sort method: {}", raw))
}

fn parse_status(raw: &str) -> Result<ViewStatus, String> {
    ViewStatus::parse(raw).ok_or_else(|| format!("unknown status: {}", raw))
}
