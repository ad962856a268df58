mod branches;
mod cli;
mod commands;
mod config;
mod git;
mod logging;
mod outcome;
mod parallel;
mod paths;
mod progress;
mod prompt;
mod repos;
mod testutil;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use git::SystemGit;
use prompt::StdinPrompt;
use tracing::info;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    let directory = cli.directory.unwrap_or_else(|| config.directory.clone());

    let repos = repos::discover_repositories(&directory, &config.exclude)?;
    info!(directory = %directory.display(), count = repos.len(), "discovered repositories");
    // With --json an empty discovery still renders the command's (empty) result.
    if repos.is_empty() && !cli.json {
        println!("No git repositories found!");
        return Ok(());
    }

    let git = SystemGit;

    // Per-repo failures are reported in the summary; the exit code stays 0.
    match cli.command {
        Command::List => {
            let result = commands::cmd_list(&repos);
            output(&result, cli.json, commands::format_list_human)?;
        }
        Command::PullAll { yes, dry_run } => {
            let prompt = StdinPrompt::default();
            let ctx = commands::PullContext {
                git: &git,
                prompt: &prompt,
                options: commands::PullOptions {
                    auto_confirm: yes,
                    dry_run,
                },
                remote: &config.remote,
                fallback_branches: &config.fallback_branches,
            };
            let result = commands::cmd_pull_all(&ctx, &repos);
            output(&result, cli.json, commands::format_pull_human)?;
        }
        Command::Exec { args } => {
            let result = commands::cmd_exec(&git, &repos, &args)?;
            output(&result, cli.json, commands::format_exec_human)?;
        }
        Command::SubmoduleList => {
            let result = commands::cmd_submodule_list(&git, &repos);
            output(&result, cli.json, commands::format_submodule_list_human)?;
        }
        Command::SubmoduleUpdate => {
            let result = commands::cmd_submodule_update(&git, &repos, &config.submodule_branch);
            output(&result, cli.json, commands::format_submodule_update_human)?;
        }
    }
    Ok(())
}

fn output<T: serde::Serialize>(result: &T, json: bool, human_fn: fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        let text = human_fn(result);
        if !text.is_empty() {
            println!("{}", text);
        }
    }
    Ok(())
}
