//! Application settings.
//!
//! Read from an optional `settings.toml` in the working directory, then
//! overridden by `SPLITLEDGER__*` environment variables, e.g.
//! `SPLITLEDGER__APP__LEVEL=debug` or `SPLITLEDGER__DATABASE=memory`.
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [database]
//! sqlite = "./splitledger.db"
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("./splitledger.db".to_string())
    }
}

impl Database {
    /// Connection string understood by sea-orm.
    pub fn url(&self) -> String {
        match self {
            Self::Memory => String::from("sqlite::memory:"),
            Self::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("SPLITLEDGER").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_urls() {
        assert_eq!(Database::Memory.url(), "sqlite::memory:");
        assert_eq!(
            Database::default().url(),
            "sqlite:./splitledger.db?mode=rwc"
        );
    }

    #[test]
    fn parses_toml_sources() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                "[app]\nlevel = \"debug\"\n[database]\nsqlite = \"/tmp/ledger.db\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.database, Database::Sqlite("/tmp/ledger.db".to_string()));
    }
}
