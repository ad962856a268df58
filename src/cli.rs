use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gbulk",
    version,
    about = "Bulk git operations across multiple repositories"
)]
pub struct Cli {
    /// Base directory to search for repositories
    #[arg(short, long, global = true)]
    pub directory: Option<PathBuf>,

    /// Path to a config file (overrides GBULK_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub json: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List all git repositories found under the base directory
    List,
    /// Fetch, prune gone branches and rebase every local branch
    PullAll {
        /// Delete gone branches without prompting
        #[arg(short = 'y', long)]
        yes: bool,
        /// Show what would happen without changing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Run a git command in every repository
    Exec {
        /// Git arguments (e.g. "status -sb")
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List submodules of repositories that have them
    SubmoduleList,
    /// Check out the configured branch in every submodule and pull it
    SubmoduleUpdate,
}
