//! Crowdsync CLI - runs translation reconciliation jobs for configured repositories.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use console::Term;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::commands::run::{Job, handle_job};
use crate::progress::ProgressReporter;

#[derive(Parser, Debug)]
#[command(name = "crowdsync")]
#[command(version)]
#[command(about = "Keeps a git docs tree, CrowdIn and GitHub/Zendesk trackers in agreement")]
#[command(
    long_about = "Crowdsync uploads changed documentation sources to a CrowdIn project, \
pre-translates what is behind, downloads finished translations back into the git tree \
and mirrors per-folder progress onto GitHub issues, milestones and project boards. \
The zendesk job mirrors Help Center articles and publishes their translations. \
The repository name `all` runs the job for every configured repository in turn, \
sharing one build cooldown; for the crowdin job, Help Center mirrors run first."
)]
#[command(after_long_help = r#"JOBS
    upload      Push changed sources to CrowdIn
    translate   Run the pre-translation engine chain
    download    Build, download and commit translations
    crowdin     Full cycle: upload, translate, download, issues, orphans
    zendesk     Mirror help-center articles and publish translations
    orphans     Report renamed and orphaned remote files

EXAMPLES
    Run a full cycle for the docs repository:
        $ crowdsync docs crowdin

    Only reconcile one folder:
        $ crowdsync docs docs/en/guide crowdin

    Check for stale remote files:
        $ crowdsync docs orphans

    Scheduled run over every repository:
        $ crowdsync all crowdin

CONFIGURATION
    Crowdsync reads configuration from:
      1. ~/.config/crowdsync/config.toml (or $XDG_CONFIG_HOME/crowdsync/config.toml)
      2. ./crowdsync.toml
      3. Environment variables (CROWDSYNC_* prefix, e.g., CROWDSYNC_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    CROWDSYNC_GITHUB_TOKEN      GitHub personal access token
    CROWDSYNC_CROWDIN_TOKEN     CrowdIn API token
    CROWDSYNC_CROWDIN_LOGIN     CrowdIn web login (phrase visibility)
    CROWDSYNC_CROWDIN_PASSWORD  CrowdIn web password
    CROWDSYNC_ZENDESK_TOKEN     Zendesk OAuth token
    RUST_LOG                    Log filter (default: crowdsync=info,crowdsync_cli=info)
"#)]
struct Cli {
    /// Configured repository name, or `all`
    repository: String,

    /// Optional folder to restrict the job to, followed by the job
    #[arg(required = true, num_args = 1..=2, value_name = "[FOLDER] JOB")]
    args: Vec<String>,
}

impl Cli {
    /// Split the trailing arguments into folder and job.
    fn folder_and_job(&self) -> Result<(Option<&str>, Job), String> {
        let (folder, job) = match self.args.as_slice() {
            [job] => (None, job),
            [folder, job] => (Some(folder.as_str()), job),
            _ => return Err("expected [FOLDER] JOB".to_string()),
        };
        let job = Job::from_str(job, true).map_err(|_| {
            let valid: Vec<String> = Job::value_variants()
                .iter()
                .filter_map(|v| v.to_possible_value())
                .map(|p| p.get_name().to_string())
                .collect();
            format!("invalid job '{}' (valid jobs: {})", job, valid.join(", "))
        })?;
        Ok((folder, job))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing for non-TTY mode (structured logging)
    // Only initialize if not connected to a TTY
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("crowdsync=info,crowdsync_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    let (folder, job) = match cli.folder_and_job() {
        Ok(parsed) => parsed,
        Err(message) => Cli::command().error(ErrorKind::InvalidValue, message).exit(),
    };

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    // Set up graceful shutdown handler (Ctrl+C)
    let cancel = CancellationToken::new();
    shutdown::setup_shutdown_handler(cancel.clone());

    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();
    let result = handle_job(
        &config,
        &cli.repository,
        folder,
        job,
        &cancel,
        Some(&callback),
    )
    .await;
    reporter.finish();
    result
}
