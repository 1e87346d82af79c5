//! Server settings shared by `sheetdesk serve` and `sheetdesk-server`
//!
//! Every flag can also be set from the environment, so a deployment only
//! needs `DB_HOST`, `DB_USER`, … exported before start.

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::{DbConfig, MirrorMode};
use crate::storage::UploadDir;

/// Database connection flags
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// Full connection URL (mysql://… or sqlite:…); overrides the DB_* fields
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Database host
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value = "3306")]
    pub db_port: u16,
}

impl DbArgs {
    pub fn to_config(&self) -> DbConfig {
        DbConfig {
            database_url: self.database_url.clone(),
            host: self.db_host.clone(),
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            name: self.db_name.clone(),
            port: self.db_port,
        }
    }
}

/// HTTP server flags
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "SHEETDESK_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "SHEETDESK_PORT")]
    pub port: u16,

    /// Directory for uploaded files [default: <tmp>/sheetdesk-uploads]
    #[arg(long, env = "SHEETDESK_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted upload, in MiB
    #[arg(long, default_value = "32", env = "SHEETDESK_MAX_UPLOAD_MB")]
    pub max_upload_mb: usize,

    /// Mirror saved rows into the database
    #[arg(long, value_enum, default_value = "off", env = "SHEETDESK_MIRROR")]
    pub mirror: MirrorMode,

    /// Attribute column for `--mirror pairs` (default: first header)
    #[arg(long, env = "SHEETDESK_MIRROR_ATTRIBUTE", requires = "mirror_value")]
    pub mirror_attribute: Option<String>,

    /// Value column for `--mirror pairs` (default: second header)
    #[arg(long, env = "SHEETDESK_MIRROR_VALUE", requires = "mirror_attribute")]
    pub mirror_value: Option<String>,

    /// Username for the login gate (gate is off unless both user and password are set)
    #[arg(long, env = "SHEETDESK_USER")]
    pub login_user: Option<String>,

    /// Password for the login gate
    #[arg(long, env = "SHEETDESK_PASSWORD", hide_env_values = true)]
    pub login_password: Option<String>,

    /// Minutes a login session stays valid
    #[arg(long, default_value = "30", env = "SHEETDESK_SESSION_TTL_MINS")]
    pub session_ttl_mins: u64,

    #[command(flatten)]
    pub db: DbArgs,
}

impl ServeArgs {
    pub fn to_config(&self) -> ServerConfig {
        let login = match (&self.login_user, &self.login_password) {
            (Some(user), Some(password)) if !user.is_empty() => Some(LoginConfig {
                user: user.clone(),
                password: password.clone(),
                session_ttl: Duration::from_secs(self.session_ttl_mins.max(1) * 60),
            }),
            _ => None,
        };

        let pair_columns = self
            .mirror_attribute
            .clone()
            .zip(self.mirror_value.clone());

        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            upload_dir: self.upload_dir.clone().unwrap_or_else(UploadDir::default_root),
            max_upload_bytes: self.max_upload_mb.max(1) * 1024 * 1024,
            mirror: self.mirror,
            pair_columns,
            db: self.db.to_config(),
            login,
        }
    }
}

/// Credentials for the optional login gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginConfig {
    pub user: String,
    pub password: String,
    pub session_ttl: Duration,
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub mirror: MirrorMode,
    pub pair_columns: Option<(String, String)>,
    pub db: DbConfig,
    pub login: Option<LoginConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upload_dir: UploadDir::default_root(),
            max_upload_bytes: 32 * 1024 * 1024,
            mirror: MirrorMode::Off,
            pair_columns: None,
            db: DbConfig::default(),
            login: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.mirror, MirrorMode::Off);
        assert!(config.login.is_none());
    }

    #[test]
    fn test_args_to_config() {
        let cli = TestCli::parse_from([
            "test",
            "--host",
            "0.0.0.0",
            "--port",
            "3000",
            "--upload-dir",
            "/srv/uploads",
            "--max-upload-mb",
            "4",
            "--mirror",
            "pairs",
            "--mirror-attribute",
            "Name",
            "--mirror-value",
            "Status",
            "--login-user",
            "admin",
            "--login-password",
            "secret",
            "--session-ttl-mins",
            "5",
            "--db-host",
            "db",
        ]);
        let config = cli.serve.to_config();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.upload_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.max_upload_bytes, 4 * 1024 * 1024);
        assert_eq!(config.mirror, MirrorMode::Pairs);
        assert_eq!(
            config.pair_columns,
            Some(("Name".to_string(), "Status".to_string()))
        );
        let login = config.login.unwrap();
        assert_eq!(login.user, "admin");
        assert_eq!(login.session_ttl, Duration::from_secs(300));
        assert_eq!(config.db.host.as_deref(), Some("db"));
        assert_eq!(config.db.port, 3306);
    }

    #[test]
    fn test_login_gate_needs_both_credentials() {
        let cli = TestCli::parse_from(["test", "--login-user", "admin"]);
        assert!(cli.serve.to_config().login.is_none());
    }
}
