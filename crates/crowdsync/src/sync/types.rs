//! Shared sync types and constants.

use std::time::Duration;

use crate::crowdin::{PollOptions, PreTranslationMethod};

/// Maximum backoff delay in milliseconds for transient failures.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum retries for a single remote call.
pub const MAX_RETRIES: u32 = 5;

/// How often pre-translation jobs and builds are polled.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Deadline for one pre-translation job.
pub const DEFAULT_PRETRANSLATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Deadline for one translation build.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Minimum spacing between two build requests.
pub const DEFAULT_EXPORT_COOLDOWN: Duration = Duration::from_secs(40 * 60);

/// A pre-translation engine, tried in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationEngine {
    /// Translation memory.
    Memory,
    /// A machine-translation engine registered on the platform.
    Machine { name: String, engine_id: u64 },
}

impl TranslationEngine {
    pub fn label(&self) -> &str {
        match self {
            Self::Memory => "tm",
            Self::Machine { name, .. } => name,
        }
    }

    pub fn method(&self) -> PreTranslationMethod {
        match self {
            Self::Memory => PreTranslationMethod::Tm,
            Self::Machine { .. } => PreTranslationMethod::Mt,
        }
    }

    pub fn engine_id(&self) -> Option<u64> {
        match self {
            Self::Memory => None,
            Self::Machine { engine_id, .. } => Some(*engine_id),
        }
    }
}

/// Knobs for one reconciliation cycle.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub poll_interval: Duration,
    pub pretranslate_timeout: Duration,
    pub build_timeout: Duration,
    pub export_cooldown: Duration,
    /// Engines in dispatch order; memory should come first.
    pub engines: Vec<TranslationEngine>,
    /// Hide code-like phrases from machine translation before dispatch.
    pub hide_code_strings: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            pretranslate_timeout: DEFAULT_PRETRANSLATE_TIMEOUT,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            export_cooldown: DEFAULT_EXPORT_COOLDOWN,
            engines: vec![TranslationEngine::Memory],
            hide_code_strings: true,
        }
    }
}

impl SyncOptions {
    pub fn pretranslate_poll(&self) -> PollOptions {
        PollOptions {
            interval: self.poll_interval,
            timeout: self.pretranslate_timeout,
        }
    }

    pub fn build_poll(&self) -> PollOptions {
        PollOptions {
            interval: self.poll_interval,
            timeout: self.build_timeout,
        }
    }
}
