mod app;
mod cli;
mod render;

pub use app::{
    ActivationReport, BranchReport, ContextReport, CreatedPullRequestReport, PullRequestReport,
    StartReport, Workbridge, WorkbridgeSettings,
};
pub use cli::{parse_cli_args, print_cli_help, CliArgs, CliCommand};
pub use render::{execute, CommandOutput};
