//! Runtime configuration for one extraction run.
//!
//! Settings come from the environment (`.env` is loaded in `main`) with CLI
//! flags layered on top. Missing translator configuration is not an error;
//! the translation chain simply falls through to its local dictionary.

use std::path::PathBuf;

use crate::normalize::TranslatorConfig;
use crate::scrapers::browser::BrowserSessionConfig;

/// Everything a single run needs, scoped to that run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Browser session knobs.
    pub browser: BrowserSessionConfig,
    /// Translation chain endpoints and credentials.
    pub translator: TranslatorConfig,
    /// Directory receiving the JSON/CSV output and any debug snapshot.
    pub output_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            browser: BrowserSessionConfig::default(),
            translator: TranslatorConfig::from_env(),
            output_dir: PathBuf::from("data"),
        }
    }
}
