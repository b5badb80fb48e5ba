//! 🔧 App Configuration — the sacred env-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the `.env.local`. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Layering, lowest priority first:
//! 1. `ODOO_*`, `SMTP_*`, `TELEGRAM_*` mapped onto their sections (`ODOO_BASE_URL` → `odoo.base_url`)
//! 2. the optional TOML file
//! 3. `TIMETALLY_<SECTION>__<KEY>`, which overrides anything

use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🏢 Where the timesheets live. Required, because a report about nothing is a poem.
    pub odoo: OdooConfig,
    /// 📬 Optional. Without it `--send-mail` logs a warning and the run carries on.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    /// 💬 Optional. Without it `--telegram` refuses to start.
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// 🏢 Connection details for the ERP's XML-RPC endpoints.
#[derive(Deserialize, Clone)]
pub struct OdooConfig {
    /// 📡 Scheme + host (+ port). `/xmlrpc/2/common` and `/xmlrpc/2/object` get appended.
    pub base_url: String,
    pub db: String,
    pub username: String,
    /// 🔒 Sent on every call. Never logged, see the Debug impl below.
    pub password: String,
}

impl std::fmt::Debug for OdooConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🔒 the password stays home. it has seen enough log aggregators.
        f.debug_struct("OdooConfig")
            .field("base_url", &self.base_url)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl OdooConfig {
    pub(crate) fn common_url(&self) -> String {
        format!("{}/xmlrpc/2/common", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn object_url(&self) -> String {
        format!("{}/xmlrpc/2/object", self.base_url.trim_end_matches('/'))
    }
}

/// 📬 SMTP relay settings. Every field defaults to empty so a half-filled section
/// still parses; [`SmtpConfig::validate`] complains at send time instead.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            // -- 📮 submission port, STARTTLS. the one everybody means.
            port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: String::new(),
        }
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

impl SmtpConfig {
    /// ✅ Everything a relay needs before we bother it.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.host.is_empty(), "💀 SMTP host is not set (SMTP_HOST)");
        ensure!(!self.from.is_empty(), "💀 SMTP sender is not set (SMTP_FROM)");
        ensure!(!self.to.is_empty(), "💀 SMTP recipient is not set (SMTP_TO)");
        Ok(())
    }
}

/// 💬 Telegram bot credentials plus the one chat it is allowed to talk to.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// 🔒 Updates from any other chat are ignored with a warning.
    pub chat_id: i64,
    /// 🌐 Overridable so tests can point the bot at a mock server.
    pub api_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: 0,
            api_url: "https://api.telegram.org".to_string(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***")
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl TelegramConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.bot_token.is_empty(),
            "💀 Telegram bot token is not set (TELEGRAM_BOT_TOKEN)"
        );
        ensure!(
            self.chat_id != 0,
            "💀 Telegram chat id is not set (TELEGRAM_CHAT_ID)"
        );
        Ok(())
    }
}

/// 🎛️ Knobs for the fetch-and-fold pipeline.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 📄 records per `search_read` call
    pub page_size: usize,
    /// 🧵 hard ceiling on concurrent page fetches (a semaphore, not a suggestion)
    pub max_workers: usize,
    /// ⏱️ per-page fetch timeout; a timed-out page is skipped like any other failure
    pub fetch_timeout_secs: u64,
    /// 🚰 bounded capacity of the report-text channel feeding the sink worker
    pub sink_capacity: usize,
    /// 📊 draw the progress bar on stderr
    pub show_progress: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_workers: 5,
            fetch_timeout_secs: 60,
            sink_capacity: 64,
            show_progress: true,
        }
    }
}

/// 📝 What goes into the report and where the file lands.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    /// 👥 The allow-list of employee display names. Empty roster, empty report.
    pub roster: Vec<String>,
    pub output_dir: PathBuf,
    /// 😴 below this many hours a day is labeled under-worked
    pub min_work_hours: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            roster: Vec::new(),
            output_dir: PathBuf::from("results"),
            min_work_hours: 8.0,
        }
    }
}

impl AppConfig {
    /// ✅ Config errors are fatal and happen before any work does.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.odoo.base_url.is_empty(),
            "💀 ODOO_BASE_URL is empty. We need to know which ERP to bother."
        );
        ensure!(!self.odoo.db.is_empty(), "💀 ODOO_DB is empty");
        ensure!(!self.odoo.username.is_empty(), "💀 ODOO_USERNAME is empty");
        ensure!(
            self.runtime.page_size > 0,
            "💀 runtime.page_size must be at least 1. Zero-sized pages paginate forever."
        );
        ensure!(
            self.runtime.max_workers > 0,
            "💀 runtime.max_workers must be at least 1. Nobody working is a strike, not a pool."
        );
        ensure!(
            self.runtime.sink_capacity > 0,
            "💀 runtime.sink_capacity must be at least 1"
        );
        Ok(())
    }
}

/// 🗺️ `ODOO_BASE_URL` → `odoo.base_url`, and friends.
fn sectioned_env(prefix: &'static str, section: &'static str) -> Env {
    Env::prefixed(prefix).map(move |key| format!("{section}.{key}").into())
}

/// 🚀 Load the config — from the environment, from a file, or from the sheer power of hoping.
///
/// 📐 `config_file_name`:
///   - `None` → env vars only. No file. No assumptions.
///   - `Some` → env vars + TOML file, merged. The file wins over the plain env names,
///     `TIMETALLY_*` wins over both.
///
/// 💀 Returns an error if config is unparseable or fails validation.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new()
        .merge(sectioned_env("ODOO_", "odoo"))
        .merge(sectioned_env("SMTP_", "smtp"))
        .merge(sectioned_env("TELEGRAM_", "telegram"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let config = config.merge(Env::prefixed("TIMETALLY_").split("__"));

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables \
             (ODOO_*, SMTP_*, TELEGRAM_*, TIMETALLY_*). The file exists in our hearts, \
             but apparently not in the right shape.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables \
                 (ODOO_*, SMTP_*, TELEGRAM_*, TIMETALLY_*). Is your .env where you think it is?"
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config
        .validate()
        .context("💀 Configuration parsed but does not make sense")?;
    Ok(app_config)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// 🧪 A config pointing at `base_url`, with a tiny roster and small pages.
    pub(crate) fn config_for(base_url: &str, output_dir: &Path) -> AppConfig {
        AppConfig {
            odoo: OdooConfig {
                base_url: base_url.to_string(),
                db: "acme".into(),
                username: "bot@acme.test".into(),
                password: "hunter2".into(),
            },
            smtp: None,
            telegram: None,
            runtime: RuntimeConfig {
                page_size: 2,
                max_workers: 2,
                fetch_timeout_secs: 5,
                sink_capacity: 4,
                show_progress: false,
            },
            report: ReportConfig {
                roster: vec!["Ada".into(), "Grace".into()],
                output_dir: output_dir.to_path_buf(),
                min_work_hours: 8.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn odoo_env(jail: &mut Jail) {
        jail.set_env("ODOO_BASE_URL", "https://erp.example.com/");
        jail.set_env("ODOO_DB", "prod");
        jail.set_env("ODOO_USERNAME", "reports@example.com");
        jail.set_env("ODOO_PASSWORD", "hunter2");
    }

    #[test]
    fn the_one_where_plain_env_names_land_in_their_sections() {
        Jail::expect_with(|jail| {
            odoo_env(jail);
            jail.set_env("SMTP_HOST", "smtp.example.com");
            jail.set_env("SMTP_PORT", "2525");
            jail.set_env("TELEGRAM_CHAT_ID", "-1001234");

            let config = load_config(None).map_err(|e| format!("{e:#}"))?;
            assert_eq!(config.odoo.db, "prod");
            assert_eq!(
                config.odoo.object_url(),
                "https://erp.example.com/xmlrpc/2/object"
            );
            let smtp = config.smtp.expect("💀 SMTP_* should build an smtp section");
            assert_eq!(smtp.host, "smtp.example.com");
            assert_eq!(smtp.port, 2525);
            let telegram = config.telegram.expect("💀 TELEGRAM_* should build a telegram section");
            assert_eq!(telegram.chat_id, -1001234);
            assert_eq!(telegram.api_url, "https://api.telegram.org");
            Ok(())
        });
    }

    #[test]
    fn the_one_where_runtime_defaults_show_up_uninvited_but_helpful() {
        Jail::expect_with(|jail| {
            odoo_env(jail);
            let config = load_config(None).map_err(|e| format!("{e:#}"))?;
            assert_eq!(config.runtime.page_size, 100);
            assert_eq!(config.runtime.max_workers, 5);
            assert_eq!(config.runtime.fetch_timeout_secs, 60);
            assert!(config.smtp.is_none());
            assert!(config.telegram.is_none());
            assert_eq!(config.report.output_dir, PathBuf::from("results"));
            assert_eq!(config.report.min_work_hours, 8.0);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_toml_file_brings_the_roster_and_the_prefix_has_the_last_word() {
        Jail::expect_with(|jail| {
            odoo_env(jail);
            jail.create_file(
                "timetally.toml",
                r#"
                [runtime]
                page_size = 50
                max_workers = 3

                [report]
                roster = ["Ada Lovelace", "Grace Hopper"]
                "#,
            )?;
            jail.set_env("TIMETALLY_RUNTIME__MAX_WORKERS", "8");

            let config = load_config(Some(Path::new("timetally.toml")))
                .map_err(|e| format!("{e:#}"))?;
            assert_eq!(config.runtime.page_size, 50);
            assert_eq!(config.runtime.max_workers, 8);
            assert_eq!(config.report.roster, vec!["Ada Lovelace", "Grace Hopper"]);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_zero_workers_is_a_strike_not_a_config() {
        Jail::expect_with(|jail| {
            odoo_env(jail);
            jail.set_env("TIMETALLY_RUNTIME__MAX_WORKERS", "0");
            let err = load_config(None).expect_err("💀 zero workers must not validate");
            assert!(format!("{err:#}").contains("max_workers"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_password_never_reaches_the_logs() {
        let config = OdooConfig {
            base_url: "https://erp.example.com".into(),
            db: "prod".into(),
            username: "reports".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(config.common_url(), "https://erp.example.com/xmlrpc/2/common");
    }
}
