mod cli;
mod cloud;
mod commands;
mod config;
mod engine;
mod interrupt;
mod paths;
mod progress;
mod resource;
mod state;
mod ui;

use anyhow::{Context as AnyhowContext, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, EnrollCommand, GetCommand};
use clusterspec::Cluster;
use declarative::{Cancellation, RunOutcome};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cloud::LocalCloud;
use crate::config::Settings;
use crate::state::StateStore;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub settings: Settings,
    pub state: StateStore,
    pub cluster_file: PathBuf,
    /// Set by Ctrl-C during plan and apply
    pub cancel: Cancellation,
    cloud_root: Option<String>,
}

impl Context {
    pub fn load_cluster(&self) -> Result<Cluster> {
        Cluster::load(&self.cluster_file)
            .with_context(|| format!("Invalid cluster document {}", self.cluster_file.display()))
    }

    /// Local provider root: flag, then settings, then the document, then `<state>/cloud`
    pub fn cloud_root(&self, cluster: &Cluster) -> PathBuf {
        if let Some(root) = self.cloud_root.as_deref().or(self.settings.cloud_root.as_deref()) {
            return paths::expand(root);
        }
        if let Some(root) = cluster.cloud_provider.local.as_ref().and_then(|l| l.root.as_deref()) {
            return root.to_path_buf();
        }
        self.state.root().join("cloud")
    }

    pub fn cloud(&self, cluster: &Cluster) -> LocalCloud {
        LocalCloud::new(&self.cloud_root(cluster), &cluster.name)
    }
}

fn exit_code(outcome: RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Converged => ExitCode::SUCCESS,
        RunOutcome::ChangesPending => ExitCode::from(2),
        RunOutcome::Error => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "kforge", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let state_root = match cli.state.as_deref() {
        Some(dir) => paths::expand(dir),
        None => paths::state_dir()?,
    };
    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        settings: Settings::load()?,
        state: StateStore::new(state_root),
        cluster_file: cli.cluster_file,
        cancel: Cancellation::new(),
        cloud_root: cli.cloud_root,
    };

    if matches!(cli.command, Command::Plan(_) | Command::Apply(_)) {
        interrupt::install(&ctx.cancel)?;
    }

    match cli.command {
        Command::Plan(args) => commands::apply::plan(&ctx, &args).map(exit_code),
        Command::Apply(args) => commands::apply::apply(&ctx, &args).map(exit_code),
        Command::Get(GetCommand::Instancegroups { output }) => {
            commands::get::instance_groups(&ctx, output)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Nodeconfig(args) => {
            commands::nodeconfig::run(&ctx, &args)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Enroll(EnrollCommand::Verify { boot, config }) => {
            commands::enroll::verify(&ctx, &boot, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// Read a file with a contextual error
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))
}
