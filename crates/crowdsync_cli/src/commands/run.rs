//! Job dispatch for `crowdsync <repository> [folder] <job>`.

use std::path::Path;

use clap::ValueEnum;
use console::style;
use crowdsync::sync::{
    CycleReport, Engine, ExportGate, HelpCenterReport, HelpCenterSync, OrphanReport,
    ProgressCallback, Remotes, check_repositories,
};
use crowdsync::vcs::commit_translations;
use crowdsync::{GitCli, RepositoryDescriptor, Vcs};
use tokio_util::sync::CancellationToken;

use crate::commands::shared::{crowdin_client, crowdin_session, github_client, zendesk_client};
use crate::config::{Config, RepositoryConfig};

/// Repository name that runs the job for every configured repository.
pub(crate) const ALL_REPOSITORIES: &str = "all";

/// What to run against the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Job {
    /// Push changed sources to CrowdIn
    Upload,
    /// Build, download and commit translations
    Download,
    /// Run the pre-translation engine chain
    Translate,
    /// Full cycle: upload, translate, download, issues and orphans
    Crowdin,
    /// Mirror help-center articles and publish their translations
    Zendesk,
    /// Report renamed and orphaned remote files
    Orphans,
}

/// Shared by every repository a single invocation touches.
struct RunContext<'a> {
    config: &'a Config,
    state_dir: &'a Path,
    gate: ExportGate,
    cancel: &'a CancellationToken,
    on_progress: Option<&'a ProgressCallback>,
}

/// Run one job for one configured repository, or for all of them.
pub(crate) async fn handle_job(
    config: &Config,
    repository: &str,
    folder: Option<&str>,
    job: Job,
    cancel: &CancellationToken,
    on_progress: Option<&ProgressCallback>,
) -> Result<(), Box<dyn std::error::Error>> {
    let all = repository == ALL_REPOSITORIES;
    if all && folder.is_some() {
        return Err(format!("A folder cannot be combined with '{ALL_REPOSITORIES}'").into());
    }
    let entries: Vec<&RepositoryConfig> = if all {
        config.repositories.iter().collect()
    } else {
        vec![lookup(config, repository)?]
    };
    let state_dir = config
        .state_dir()
        .ok_or("Could not determine a state directory; set [sync] state_dir")?;
    std::fs::create_dir_all(&state_dir)?;

    let ctx = RunContext {
        config,
        state_dir: &state_dir,
        gate: ExportGate::new(config.sync_options().export_cooldown),
        cancel,
        on_progress,
    };

    // Help-center mirrors go first so a full cycle picks up their sources.
    if job == Job::Zendesk || (all && job == Job::Crowdin) {
        for entry in &entries {
            if config.zendesk_site(&entry.name).is_some() || !all {
                let repo = entry.descriptor(folder)?;
                run_zendesk(&ctx, &repo).await?;
            }
        }
    }
    if job == Job::Zendesk {
        return Ok(());
    }

    let github = github_client(config)?;
    let descriptors = config
        .repositories
        .iter()
        .map(|r| r.descriptor(None))
        .collect::<Result<Vec<_>, _>>()?;
    check_repositories(&github, &descriptors, on_progress).await?;

    for entry in entries {
        run_crowdin_job(&ctx, entry, folder, job).await?;
    }
    Ok(())
}

fn lookup<'a>(
    config: &'a Config,
    repository: &str,
) -> Result<&'a RepositoryConfig, Box<dyn std::error::Error>> {
    config.repository(repository).ok_or_else(|| {
        let known: Vec<&str> = config.repositories.iter().map(|r| r.name.as_str()).collect();
        format!(
            "Repository '{}' is not configured. Known repositories: {}",
            repository,
            if known.is_empty() {
                "(none)".to_string()
            } else {
                known.join(", ")
            }
        )
        .into()
    })
}

async fn run_crowdin_job(
    ctx: &RunContext<'_>,
    entry: &RepositoryConfig,
    folder: Option<&str>,
    job: Job,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ctx.config;
    let on_progress = ctx.on_progress;
    let repo = entry.descriptor(folder)?;
    let git = GitCli::new(repo.git_root());
    let github = github_client(config)?;
    let crowdin = crowdin_client(config)?;
    let project = entry.project()?;
    let session = match job {
        Job::Translate | Job::Crowdin => crowdin_session(config, &project)?,
        _ => None,
    };
    let options = config.sync_options();
    let remotes = Remotes {
        github: &github,
        crowdin: &crowdin,
        session: session.as_ref(),
    };
    let engine = Engine::new(
        remotes,
        &git,
        &repo,
        &project,
        &options,
        ctx.state_dir,
        ctx.cancel,
    )
    .with_backend(entry.backend())
    .with_ignore(config.ignore_registry())
    .with_gate(ctx.gate.clone());

    match job {
        Job::Upload => {
            git.checkout(repo.branch()).await?;
            let scan = engine.scan(on_progress).await?;
            let report = engine.upload(&scan.changed, on_progress).await?;
            println!(
                "{} Uploaded {} files ({} ignored)",
                style("✓").green().bold(),
                report.uploaded.len(),
                report.ignored.len()
            );
        }
        Job::Translate => {
            git.checkout(repo.branch()).await?;
            let scan = engine.scan(on_progress).await?;
            let metadata = engine.metadata(&scan.all).await?;
            let report = engine.translate(&scan.all, metadata, on_progress).await?;
            println!(
                "{} {} engine rounds, {} files still behind",
                style("✓").green().bold(),
                report.rounds.len(),
                report.remaining.len()
            );
        }
        Job::Download => {
            git.checkout(repo.branch()).await?;
            let scan = engine.scan(on_progress).await?;
            let metadata = engine.metadata(&scan.all).await?;
            let refresh = engine.refresh_list(&scan.all, &metadata, &[]);
            let (report, committed) = engine.download(&refresh, on_progress).await?;
            println!(
                "{} Wrote {} translated files{}",
                style("✓").green().bold(),
                report.written.len(),
                if committed { ", committed" } else { "" }
            );
        }
        Job::Crowdin => {
            let report = engine.run_cycle(on_progress).await?;
            print_cycle(&repo, &report);
        }
        Job::Orphans => {
            let scan = engine.scan(on_progress).await?;
            let metadata = engine.metadata(&scan.all).await?;
            let (report, deleted) = engine.orphans(&metadata, on_progress).await?;
            print_orphans(&report, deleted);
        }
        Job::Zendesk => {}
    }
    Ok(())
}

/// Every path a help-center run changed in the working tree.
fn zendesk_paths(report: &HelpCenterReport) -> Vec<String> {
    report
        .written
        .iter()
        .chain(&report.removed)
        .chain(&report.companions)
        .cloned()
        .collect()
}

async fn run_zendesk(
    ctx: &RunContext<'_>,
    repo: &RepositoryDescriptor,
) -> Result<(), Box<dyn std::error::Error>> {
    let site_config = ctx
        .config
        .zendesk_site(repo.name())
        .ok_or_else(|| format!("No [[zendesk_sites]] entry for repository '{}'", repo.name()))?;
    let site = site_config.site();
    let zendesk = zendesk_client(ctx.config, &site.domain)?;
    let git = GitCli::new(repo.git_root());

    git.checkout(repo.branch()).await?;
    let report = HelpCenterSync::new(
        &zendesk,
        &site,
        ctx.state_dir,
        repo.git_root(),
        repo.project_folder(),
    )
    .run(ctx.on_progress)
    .await?;

    let committed = commit_translations(&git, &zendesk_paths(&report)).await?;
    println!(
        "{} {} articles mirrored, {} moved, {} translations published{}",
        style("✓").green().bold(),
        report.written.len(),
        report.removed.len(),
        report.published.len(),
        if committed { ", committed" } else { "" }
    );
    Ok(())
}

fn print_cycle(repo: &RepositoryDescriptor, report: &CycleReport) {
    println!(
        "{} {} ({})",
        style("✓").green().bold(),
        style(repo.name()).cyan(),
        repo.branch()
    );
    println!(
        "    {} changed of {} files, {} uploaded",
        report.scan.changed.len(),
        report.scan.all.len(),
        report.upload.uploaded.len()
    );
    println!(
        "    {} engine rounds, {} files still behind",
        report.pretranslate.rounds.len(),
        report.pretranslate.remaining.len()
    );
    println!(
        "    {} translated files written{}",
        report.download.written.len(),
        if report.committed { ", committed" } else { "" }
    );
    println!(
        "    {} issues tracked, {} closed, {} cards moved",
        report.issues.tracked.len(),
        report.issues.closed.len(),
        report.issues.moved
    );
    for reference in &report.references {
        println!("    saved {}", reference.display());
    }
    if !report.orphans.is_empty() {
        print_orphans(&report.orphans, report.deleted);
    }
}

fn print_orphans(report: &OrphanReport, deleted: usize) {
    if report.is_empty() {
        println!("{} No orphaned remote files", style("✓").green().bold());
        return;
    }
    for rename in &report.renames {
        println!(
            "  {} {} -> {}",
            style("renamed").yellow(),
            rename.from,
            rename.to
        );
    }
    for orphan in &report.orphans {
        println!("  {} {}", style("orphan").red(), orphan.path);
    }
    for ambiguous in &report.ambiguous {
        println!(
            "  {} {} ({})",
            style("ambiguous").yellow(),
            ambiguous.path,
            ambiguous.candidates.join(", ")
        );
    }
    if deleted > 0 {
        println!("{} Deleted {} stale remote files", style("✓").green().bold(), deleted);
    } else {
        println!(
            "{} Nothing deleted; set delete_enabled = true on the repository to remove stale files",
            style("⚠").yellow().bold()
        );
    }
}
