//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use assess_core::model::SubmissionPolicy;
use chrono::Duration;
use clap::{Parser, Subcommand};
use services::ServiceSettings;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid database url: {0}")]
    InvalidDbUrl(String),
    #[error("session ttl must be between 1 and 8784 hours")]
    InvalidSessionTtl,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

/// Assessment progress server.
#[derive(Debug, Parser)]
#[command(name = "app", version)]
pub struct Cli {
    /// `SQLite` database url or file path.
    #[arg(long = "db", env = "ASSESS_DB_URL", default_value = "sqlite://assess.sqlite3", global = true)]
    pub db_url: String,

    #[arg(long, env = "ASSESS_BIND_ADDR", default_value = "127.0.0.1:5000")]
    pub bind_addr: SocketAddr,

    #[arg(long, env = "ASSESS_SESSION_TTL_HOURS", default_value_t = 24)]
    pub session_ttl_hours: i64,

    /// `amend` lets submitted forms be overwritten, `lock` freezes them.
    #[arg(long, env = "ASSESS_SUBMISSION_POLICY", default_value = "amend")]
    pub submission_policy: SubmissionPolicy,

    /// Origins allowed to make credentialed cross-origin requests.
    #[arg(
        long,
        env = "ASSESS_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://127.0.0.1:3000"
    )]
    pub cors_origins: Vec<String>,

    /// Mark the session cookie `Secure`.
    #[arg(long, env = "ASSESS_SECURE_COOKIE")]
    pub secure_cookie: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Load question sets from a JSON file, replacing each listed form.
    Seed {
        #[arg(long)]
        questions: PathBuf,
    },
}

impl Cli {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSessionTtl` for a ttl outside
    /// `1..=MAX_SESSION_TTL_HOURS`.
    pub fn service_settings(&self) -> Result<ServiceSettings, ConfigError> {
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(ConfigError::InvalidSessionTtl);
        }
        Ok(ServiceSettings {
            session_ttl: Duration::hours(self.session_ttl_hours),
            submission_policy: self.submission_policy,
        })
    }
}

/// Turn a bare path or relative `sqlite:` url into an absolute `sqlite://` url.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its parent directory exist.
///
/// # Errors
///
/// Returns `ConfigError` if the url has no path or the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), ConfigError> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError::InvalidDbUrl(db_url.to_owned()))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError::InvalidDbUrl(db_url.to_owned()));
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
