use std::path::Path;

use chrono::Duration;
use twelf::{Layer, config};

use crate::domain::{models::Course, session::SessionSettings};

const CONFIG_FILE: &str = "course.yaml";
const ENV_PREFIX: &str = "COURSE_";

/// Connection string selecting the in-process store instead of a database.
pub const MEMORY_STORE: &str = "memory";

fn default_db_connection_string() -> String {
    "sqlite://course.sqlite?mode=rwc".into()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}

fn default_public_url() -> String {
    "http://localhost:3000".into()
}

fn default_resume_window_days() -> i64 {
    30
}

fn default_quiz_pass_percent() -> u32 {
    60
}

/// Service settings. Read from `course.yaml` when present, then overridden by
/// `COURSE_*` environment variables.
#[config]
#[derive(Debug, Clone)]
pub struct Config {
    #[serde(default = "default_db_connection_string")]
    pub db_connection_string: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_resume_window_days")]
    pub resume_window_days: i64,
    #[serde(default = "default_quiz_pass_percent")]
    pub quiz_pass_percent: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_connection_string: default_db_connection_string(),
            bind_addr: default_bind_addr(),
            public_url: default_public_url(),
            resume_window_days: default_resume_window_days(),
            quiz_pass_percent: default_quiz_pass_percent(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut layers = Vec::new();
        if Path::new(CONFIG_FILE).exists() {
            layers.push(Layer::Yaml(CONFIG_FILE.into()));
        }
        layers.push(Layer::Env(Some(ENV_PREFIX.to_string())));
        Ok(Config::with_layers(&layers)?)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.db_connection_string.is_empty() {
            return Err("COURSE_DB_CONNECTION_STRING is empty".into());
        }
        if self.resume_window_days <= 0 {
            return Err(format!(
                "COURSE_RESUME_WINDOW_DAYS must be positive, got {}",
                self.resume_window_days
            ));
        }
        if !(1..=100).contains(&self.quiz_pass_percent) {
            return Err(format!(
                "COURSE_QUIZ_PASS_PERCENT must be between 1 and 100, got {}",
                self.quiz_pass_percent
            ));
        }
        Ok(())
    }

    /// The lesson count is fixed: the achievement catalog's completion
    /// thresholds are written against it.
    pub fn course(&self) -> Course {
        Course::default()
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            resume_window: Duration::days(self.resume_window_days),
            quiz_pass_percent: self.quiz_pass_percent,
        }
    }
}
