//! Configuration file support for crowdsync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. Environment variables (prefixed with `CROWDSYNC_`, e.g., `CROWDSYNC_GITHUB_TOKEN`)
//! 2. Local config file (./crowdsync.toml)
//! 3. XDG config file (~/.config/crowdsync/config.toml)
//! 4. Built-in defaults
//!
//! A `.env` file in the current directory is read into the environment first.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use CROWDSYNC_GITHUB_TOKEN env var
//!
//! [crowdin]
//! token = "..."
//! login = "translator@example.com"  # web session for phrase visibility
//! password = "..."
//! engine_ids = { deepl = 101, google = 102 }
//!
//! [zendesk]
//! token = "..."
//!
//! [sync]
//! engines = ["tm", "deepl"]
//! export_cooldown_secs = 2400
//!
//! [[repositories]]
//! name = "docs"
//! git_root = "/work/docs"
//! origin = "acme/docs"
//! branch = "main"
//! project_folder = "docs"
//! crowdin_project_id = 7
//! crowdin_project_name = "acme-docs"
//! dest_folder = "docs-remote"
//! target_language = "ja-JP"
//! tracker = "projects_v2"
//! project_number = 3
//!
//! [[ignore]]
//! repository = "acme/docs"
//! file = "docs/en/legal.md"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use crowdsync::descriptor::DescriptorError;
use crowdsync::sync::{IgnoreRegistry, SyncOptions, TranslationEngine};
use crowdsync::zendesk::HelpCenterSite;
use crowdsync::{RemoteTrackerBackend, RepositoryDescriptor, TranslationProjectDescriptor};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub crowdin: CrowdinConfig,
    pub zendesk: ZendeskConfig,
    /// Default cycle options.
    pub sync: SyncConfig,
    pub repositories: Vec<RepositoryConfig>,
    pub zendesk_sites: Vec<ZendeskSiteConfig>,
    /// Files never uploaded, per repository origin.
    pub ignore: Vec<IgnoreEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via CROWDSYNC_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CrowdinConfig {
    /// API token. Can also be set via CROWDSYNC_CROWDIN_TOKEN.
    pub token: Option<String>,
    pub api_url: Option<String>,
    /// Web login; enables phrase visibility changes when set with `password`.
    pub login: Option<String>,
    pub password: Option<String>,
    pub web_url: Option<String>,
    /// Numeric language id of the web backend.
    pub web_language_id: u32,
    /// Machine translation engine ids by engine name.
    pub engine_ids: BTreeMap<String, u64>,
}

impl Default for CrowdinConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            login: None,
            password: None,
            web_url: None,
            web_language_id: 25,
            engine_ids: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ZendeskConfig {
    /// OAuth bearer token. Can also be set via CROWDSYNC_ZENDESK_TOKEN.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Where issue, milestone and article state is kept.
    pub state_dir: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub pretranslate_timeout_secs: u64,
    pub build_timeout_secs: u64,
    pub export_cooldown_secs: u64,
    /// Engines in dispatch order; `tm` is translation memory.
    pub engines: Vec<String>,
    /// Request pacing applied to every remote.
    pub requests_per_second: u32,
    pub hide_code_strings: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            poll_interval_secs: 5,
            pretranslate_timeout_secs: 1800,
            build_timeout_secs: 1800,
            export_cooldown_secs: 2400,
            engines: vec!["tm".into(), "deepl".into(), "google".into()],
            requests_per_second: 10,
            hide_code_strings: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    #[default]
    Issues,
    ProjectsClassic,
    ProjectsV2,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub git_root: PathBuf,
    pub origin: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub project_folder: String,
    #[serde(default)]
    pub single_folder: Option<String>,
    #[serde(default)]
    pub upstream: Option<String>,
    #[serde(default)]
    pub check_upstream: bool,
    pub crowdin_project_id: u64,
    pub crowdin_project_name: String,
    pub dest_folder: String,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    pub target_language: String,
    #[serde(default)]
    pub delete_enabled: bool,
    #[serde(default)]
    pub tracker: TrackerKind,
    #[serde(default)]
    pub project_number: Option<u64>,
    /// CrowdIn translation memory saved after each cycle.
    #[serde(default)]
    pub tm_id: Option<u64>,
    /// CrowdIn glossary saved after each cycle.
    #[serde(default)]
    pub glossary_id: Option<u64>,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZendeskSiteConfig {
    pub domain: String,
    /// Name of the repository the articles are mirrored into.
    pub repository: String,
    #[serde(default = "default_source_locale")]
    pub source_locale: String,
    pub target_locale: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

fn default_source_locale() -> String {
    "en-us".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgnoreEntry {
    pub repository: String,
    pub file: String,
}

impl RepositoryConfig {
    /// Repository descriptor, scoped to `folder` when one is given.
    pub fn descriptor(&self, folder: Option<&str>) -> Result<RepositoryDescriptor, DescriptorError> {
        let mut repo = RepositoryDescriptor::new(
            &self.name,
            &self.git_root,
            &self.origin,
            &self.branch,
            &self.project_folder,
        )?;
        if let Some(upstream) = &self.upstream {
            repo = repo.with_upstream(upstream, self.check_upstream);
        }
        if let Some(single) = folder.or(self.single_folder.as_deref()) {
            repo = repo.with_single_folder(single)?;
        }
        Ok(repo)
    }

    pub fn project(&self) -> Result<TranslationProjectDescriptor, DescriptorError> {
        Ok(TranslationProjectDescriptor::new(
            self.crowdin_project_id,
            &self.crowdin_project_name,
            &self.source_language,
            &self.target_language,
            &self.dest_folder,
        )?
        .with_delete_enabled(self.delete_enabled)
        .with_references(self.tm_id, self.glossary_id))
    }

    /// Board backend; a v2 tracker without a project number falls back to
    /// plain issues.
    pub fn backend(&self) -> RemoteTrackerBackend {
        match (self.tracker, self.project_number) {
            (TrackerKind::Issues, _) => RemoteTrackerBackend::Issues,
            (TrackerKind::ProjectsClassic, _) => RemoteTrackerBackend::ProjectsClassic,
            (TrackerKind::ProjectsV2, Some(number)) => RemoteTrackerBackend::ProjectsV2 { number },
            (TrackerKind::ProjectsV2, None) => {
                tracing::warn!(repository = %self.name, "projects_v2 tracker without project_number, using issues");
                RemoteTrackerBackend::Issues
            }
        }
    }
}

impl ZendeskSiteConfig {
    pub fn site(&self) -> HelpCenterSite {
        HelpCenterSite {
            domain: self.domain.clone(),
            source_locale: self.source_locale.clone(),
            target_locale: self.target_locale.clone(),
            categories: self.categories.clone(),
            labels: self.labels.clone(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/crowdsync/config.toml)
    /// 3. Local config file (./crowdsync.toml)
    /// 4. Environment variables with CROWDSYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("crowdsync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./crowdsync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., CROWDSYNC_GITHUB_TOKEN -> github.token
        builder = builder.add_source(
            Environment::with_prefix("CROWDSYNC")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    pub fn repository(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.name == name)
    }

    pub fn zendesk_site(&self, repository: &str) -> Option<&ZendeskSiteConfig> {
        self.zendesk_sites
            .iter()
            .find(|s| s.repository == repository)
    }

    /// Engine chain from `[sync] engines`; names without a configured id
    /// are skipped.
    pub fn engines(&self) -> Vec<TranslationEngine> {
        self.sync
            .engines
            .iter()
            .filter_map(|name| match name.as_str() {
                "tm" => Some(TranslationEngine::Memory),
                other => match self.crowdin.engine_ids.get(other) {
                    Some(&engine_id) => Some(TranslationEngine::Machine {
                        name: other.to_string(),
                        engine_id,
                    }),
                    None => {
                        tracing::warn!(engine = %other, "No engine id configured, skipping");
                        None
                    }
                },
            })
            .collect()
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            poll_interval: Duration::from_secs(self.sync.poll_interval_secs),
            pretranslate_timeout: Duration::from_secs(self.sync.pretranslate_timeout_secs),
            build_timeout: Duration::from_secs(self.sync.build_timeout_secs),
            export_cooldown: Duration::from_secs(self.sync.export_cooldown_secs),
            engines: self.engines(),
            hide_code_strings: self.sync.hide_code_strings,
        }
    }

    pub fn ignore_registry(&self) -> IgnoreRegistry {
        IgnoreRegistry::new(
            self.ignore
                .iter()
                .map(|e| (e.repository.clone(), e.file.clone())),
        )
    }

    /// Configured state directory, else the platform default.
    pub fn state_dir(&self) -> Option<PathBuf> {
        self.sync.state_dir.clone().or_else(Self::default_state_dir)
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "crowdsync").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/crowdsync` or `~/.local/state/crowdsync`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "crowdsync").map(|dirs| {
            // state_dir() returns None on macOS/Windows
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    const REPO: &str = r#"
        [[repositories]]
        name = "docs"
        git_root = "/work/docs"
        origin = "acme/docs"
        project_folder = "docs"
        crowdin_project_id = 7
        crowdin_project_name = "acme-docs"
        dest_folder = "docs-remote"
        target_language = "ja-JP"
    "#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert!(config.crowdin.token.is_none());
        assert_eq!(config.crowdin.web_language_id, 25);
        assert_eq!(config.sync.poll_interval_secs, 5);
        assert_eq!(config.sync.export_cooldown_secs, 2400);
        assert_eq!(config.sync.engines, vec!["tm", "deepl", "google"]);
        assert_eq!(config.sync.requests_per_second, 10);
        assert!(config.sync.hide_code_strings);
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn test_repository_defaults() {
        let config = parse(REPO);
        let repo = config.repository("docs").unwrap();
        assert_eq!(repo.branch, "master");
        assert_eq!(repo.source_language, "en");
        assert_eq!(repo.tracker, TrackerKind::Issues);
        assert!(!repo.delete_enabled);

        let project = repo.project().unwrap();
        assert_eq!(project.target_language(), "ja");
        assert!(!project.delete_enabled());
        assert_eq!(project.translation_memory(), None);
        assert_eq!(repo.backend(), RemoteTrackerBackend::Issues);
    }

    #[test]
    fn test_reference_ids_reach_the_project() {
        let toml = format!("{REPO}
tm_id = 11
glossary_id = 3
");
        let config = parse(&toml);
        let project = config.repositories[0].project().unwrap();
        assert_eq!(project.translation_memory(), Some(11));
        assert_eq!(project.glossary(), Some(3));
    }

    #[test]
    fn test_repository_descriptor_with_folder() {
        let config = parse(REPO);
        let repo = config.repository("docs").unwrap();
        let descriptor = repo.descriptor(Some("docs/en/guide")).unwrap();
        assert_eq!(descriptor.single_folder(), Some("docs/en/guide"));
        assert!(repo.descriptor(Some("elsewhere/en")).is_err());
    }

    #[test]
    fn test_projects_v2_needs_number() {
        let toml = format!("{REPO}\ntracker = \"projects_v2\"\nproject_number = 3\n");
        let config = parse(&toml);
        assert_eq!(
            config.repositories[0].backend(),
            RemoteTrackerBackend::ProjectsV2 { number: 3 }
        );

        let toml = format!("{REPO}\ntracker = \"projects_v2\"\n");
        let config = parse(&toml);
        assert_eq!(config.repositories[0].backend(), RemoteTrackerBackend::Issues);
    }

    #[test]
    fn test_engines_resolve_configured_ids() {
        let config = parse(
            r#"
            [crowdin]
            engine_ids = { deepl = 101 }

            [sync]
            engines = ["tm", "deepl", "google"]
        "#,
        );
        assert_eq!(
            config.engines(),
            vec![
                TranslationEngine::Memory,
                TranslationEngine::Machine {
                    name: "deepl".into(),
                    engine_id: 101
                },
            ]
        );
    }

    #[test]
    fn test_sync_options_from_config() {
        let config = parse(
            r#"
            [sync]
            poll_interval_secs = 2
            export_cooldown_secs = 60
            engines = ["tm"]
            hide_code_strings = false
        "#,
        );
        let options = config.sync_options();
        assert_eq!(options.poll_interval, Duration::from_secs(2));
        assert_eq!(options.export_cooldown, Duration::from_secs(60));
        assert_eq!(options.pretranslate_timeout, Duration::from_secs(1800));
        assert_eq!(options.engines, vec![TranslationEngine::Memory]);
        assert!(!options.hide_code_strings);
    }

    #[test]
    fn test_zendesk_site_and_ignore() {
        let config = parse(
            r#"
            [[zendesk_sites]]
            domain = "help.example.com"
            repository = "docs"
            target_locale = "ja"
            categories = ["Guides"]

            [[ignore]]
            repository = "acme/docs"
            file = "docs/en/legal.md"
        "#,
        );
        let site = config.zendesk_site("docs").unwrap().site();
        assert_eq!(site.source_locale, "en-us");
        assert_eq!(site.categories, vec!["Guides"]);
        assert!(config.zendesk_site("other").is_none());

        let ignore = config.ignore_registry();
        assert!(ignore.is_ignored("acme/docs", "docs/en/legal.md"));
        assert!(!ignore.is_ignored("acme/docs", "docs/en/other.md"));
    }

    #[test]
    fn test_state_dir_prefers_configured_value() {
        let config = parse("[sync]\nstate_dir = \"/var/lib/crowdsync\"\n");
        assert_eq!(config.state_dir(), Some(PathBuf::from("/var/lib/crowdsync")));
        if let Some(default) = Config::default_state_dir() {
            assert!(default.to_string_lossy().contains("crowdsync"));
        }
    }

    #[test]
    fn test_environment_prefix() {
        let env_source = Environment::with_prefix("CROWDSYNC")
            .separator("_")
            .try_parsing(true);
        let _builder = ConfigBuilder::builder().add_source(env_source);
    }
}
