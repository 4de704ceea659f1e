/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{Cli, Commands, OutputFormat, ShellCommand, ShellLine};
pub use commands::{handle_command, run_shell, ShellOutcome, Workspace};
