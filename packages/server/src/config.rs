use std::path::PathBuf;

use chrono::{TimeDelta, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// `secs` as a [`TimeDelta`], if it is representable.
pub fn seconds(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
}

/// Reject durations that cannot be added to or subtracted from the current time.
fn check_duration(key: &str, secs: u64) -> Result<(), ConfigError> {
    let now = Utc::now();
    let fits = seconds(secs).is_some_and(|d| {
        now.checked_add_signed(d).is_some() && now.checked_sub_signed(d).is_some()
    });
    if !fits {
        return Err(ConfigError::Message(format!("{key} is out of range: {secs}")));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed origins. `"*"` allows any origin.
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Account created on startup with the `admin` role, if configured.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminSeedConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued bearer tokens.
    pub token_ttl_secs: u64,
    /// Lifetime of verification and password-reset codes.
    pub otp_ttl_secs: u64,
    #[serde(default)]
    pub admin: Option<AdminSeedConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    /// When false, outgoing mail is only logged.
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from: String,
    pub starttls: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Local holding area for multipart files before they are promoted to the store.
    pub staging_dir: PathBuf,
    pub max_video_size: u64,
    pub max_thumbnail_size: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Database,
    Filesystem,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root of the bucket when `backend = "filesystem"`.
    pub filesystem_path: PathBuf,
    pub chunk_size: usize,
    /// Seconds between orphan sweeps. `0` disables the sweep.
    pub sweep_interval_secs: u64,
    /// Minimum age before an unreferenced file is considered orphaned.
    pub orphan_grace_secs: u64,
}

impl StorageConfig {
    pub fn orphan_grace(&self) -> TimeDelta {
        seconds(self.orphan_grace_secs).unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    pub ffprobe_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("server.cors.allow_origins", vec!["*"])?
            .set_default("server.cors.max_age", 3600)?
            .set_default("auth.token_ttl_secs", 3600)?
            .set_default("auth.otp_ttl_secs", 600)?
            .set_default("mail.enabled", false)?
            .set_default("mail.smtp_host", "smtp.gmail.com")?
            .set_default("mail.smtp_port", 587)?
            .set_default("mail.from", "no-reply@localhost")?
            .set_default("mail.starttls", true)?
            .set_default("upload.staging_dir", "./uploads")?
            .set_default("upload.max_video_size", 500 * 1024 * 1024)?
            .set_default("upload.max_thumbnail_size", 10 * 1024 * 1024)?
            .set_default("storage.backend", "database")?
            .set_default("storage.filesystem_path", "./data/bucket")?
            .set_default("storage.chunk_size", common::storage::DEFAULT_CHUNK_SIZE as u64)?
            .set_default("storage.sweep_interval_secs", 3600)?
            .set_default("storage.orphan_grace_secs", 3600)?
            .set_default("media.ffprobe_path", "ffprobe")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., VIDHOST__AUTH__JWT_SECRET)
            .add_source(
                Environment::with_prefix("VIDHOST")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins"),
            )
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_duration("auth.token_ttl_secs", self.auth.token_ttl_secs)?;
        check_duration("auth.otp_ttl_secs", self.auth.otp_ttl_secs)?;
        check_duration("storage.orphan_grace_secs", self.storage.orphan_grace_secs)
    }
}
