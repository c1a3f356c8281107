use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use signdrill_core::SessionLimits;
use std::path::{Path, PathBuf};

use crate::api::routes::SessionPolicy;
use crate::cli::opts::Cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Json,
    Sqlite,
}

/// Settings from `signdrill.toml`, then overridden by command-line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub store: StoreKind,
    pub db_path: Option<PathBuf>,
    pub new_card_limit: usize,
    pub total_card_limit: usize,
    pub api_addr: String,
    /// Minutes an unfinished API session is kept without activity.
    pub session_idle_minutes: u32,
    pub max_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let limits = SessionLimits::default();
        Self {
            store: StoreKind::Json,
            db_path: None,
            new_card_limit: limits.new_cards,
            total_card_limit: limits.total_cards,
            api_addr: "127.0.0.1:8080".to_string(),
            session_idle_minutes: 60,
            max_sessions: 256,
        }
    }
}

impl AppConfig {
    /// Read `explicit`, or the default config file when it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => (signdrill_json::paths::default_config_file(), false),
        };
        if !path.exists() {
            if required {
                bail!("config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let cfg = Self::parse(&raw).with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(store) = cli.store {
            self.store = store;
        }
        if let Some(p) = &cli.db_path {
            self.db_path = Some(p.clone());
        }
        if let Some(n) = cli.new_limit {
            self.new_card_limit = n;
        }
        if let Some(n) = cli.total_limit {
            self.total_card_limit = n;
        }
        self
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            idle_ttl: chrono::Duration::minutes(i64::from(self.session_idle_minutes)),
            max_sessions: self.max_sessions,
        }
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            new_cards: self.new_card_limit,
            total_cards: self.total_card_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn empty_file_is_defaults() {
        assert_eq!(AppConfig::parse("").unwrap(), AppConfig::default());
    }

    #[test]
    fn file_values_then_flags() {
        let cfg = AppConfig::parse(
            r#"
            store = "sqlite"
            new_card_limit = 3
            total_card_limit = 12
            "#,
        )
        .unwrap();
        assert_eq!(cfg.store, StoreKind::Sqlite);
        assert_eq!(cfg.limits(), SessionLimits { new_cards: 3, total_cards: 12 });

        let cli = Cli::parse_from(["signdrill", "--store", "json", "--new-limit", "8", "stats"]);
        let merged = cfg.apply_cli(&cli);
        assert_eq!(merged.store, StoreKind::Json);
        assert_eq!(merged.new_card_limit, 8);
        assert_eq!(merged.total_card_limit, 12);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(AppConfig::parse("colour = \"blue\"").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());

        let present = dir.path().join("signdrill.toml");
        std::fs::write(&present, "api_addr = \"0.0.0.0:9000\"\n").unwrap();
        assert_eq!(AppConfig::load(Some(&present)).unwrap().api_addr, "0.0.0.0:9000");
    }

    #[test]
    fn session_policy_from_file() {
        let cfg = AppConfig::parse("session_idle_minutes = 5\nmax_sessions = 3\n").unwrap();
        let policy = cfg.session_policy();
        assert_eq!(policy.idle_ttl, chrono::Duration::minutes(5));
        assert_eq!(policy.max_sessions, 3);
    }
}
