use std::{path::PathBuf, time::Duration};

use rand::Rng;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::domain::selectors::SelectorTable;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub browser: BrowserSettings,
    pub scraper: ScraperSettings,
    #[serde(default)]
    pub selectors: SelectorTable,
    pub artifact: ArtifactSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub no_sandbox: bool,
    #[serde(default)]
    pub disable_dev_shm_usage: bool,
    pub binary: Option<String>,
    pub page_load_timeout_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ScraperSettings {
    pub banks: Vec<String>,
    pub geography_qualifier: String,
    pub search_base_url: String,
    pub element_wait_secs: u64,
    pub search_settle: DelayRange,
    pub branch_settle: DelayRange,
    pub panel_settle: DelayRange,
    pub reveal_settle: DelayRange,
    pub results_scroll: ScrollSettings,
    pub reviews_scroll: ScrollSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ScrollSettings {
    pub poll: DelayRange,
    pub budget_secs: u64,
    #[serde(default = "default_stable_reads")]
    pub stable_reads: u32,
}

/// Bounds of a randomized pause, in seconds.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ArtifactSettings {
    pub directory: String,
    pub base_name: String,
}

fn default_stable_reads() -> u32 {
    1
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

impl DelayRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        DelayRange { min_secs, max_secs }
    }

    pub fn sample(&self) -> Duration {
        if self.max_secs <= self.min_secs {
            return Duration::from_secs_f64(self.min_secs.max(0.0));
        }
        let secs = rand::thread_rng().gen_range(self.min_secs..=self.max_secs);
        Duration::from_secs_f64(secs)
    }

    fn check(&self, name: &str) -> Result<(), config::ConfigError> {
        let finite = self.min_secs.is_finite() && self.max_secs.is_finite();
        if !finite || self.min_secs < 0.0 || self.max_secs < self.min_secs {
            return Err(config::ConfigError::Message(format!(
                "{} must satisfy 0 <= min_secs <= max_secs, got {:?}",
                name, self
            )));
        }
        Ok(())
    }
}

impl ScraperSettings {
    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }
}

impl ArtifactSettings {
    /// Path of the artifact still waiting to be loaded.
    pub fn pending_path(&self) -> PathBuf {
        expand_home(&self.directory).join(format!("{}.json", self.base_name))
    }
}

impl Settings {
    fn validate(&self) -> Result<(), config::ConfigError> {
        let scraper = &self.scraper;
        scraper.search_settle.check("scraper.search_settle")?;
        scraper.branch_settle.check("scraper.branch_settle")?;
        scraper.panel_settle.check("scraper.panel_settle")?;
        scraper.reveal_settle.check("scraper.reveal_settle")?;
        scraper.results_scroll.poll.check("scraper.results_scroll.poll")?;
        scraper.reviews_scroll.poll.check("scraper.reviews_scroll.poll")?;

        if scraper.results_scroll.stable_reads == 0 || scraper.reviews_scroll.stable_reads == 0 {
            return Err(config::ConfigError::Message(
                "stable_reads must be at least 1".to_string(),
            ));
        }

        if self.artifact.directory.starts_with("~/") && dirs::home_dir().is_none() {
            return Err(config::ConfigError::Message(format!(
                "artifact.directory {} needs a home directory, none was found",
                self.artifact.directory
            )));
        }

        self.selectors
            .compile()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(())
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<Settings>()?;

    settings.validate()?;
    Ok(settings)
}
