use crate::filesystem::MediaStore;
use anyhow::{bail, Context};
use sea_orm::DatabaseConnection;
use std::path::PathBuf;

/// Runtime settings read from the environment (and `.env`) once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub session_time: chrono::Duration,
    pub media_dir: PathBuf,
    /// Cookie signing key. At least 64 bytes when present.
    pub secret_key: Option<Vec<u8>>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8080".to_owned());

        let minutes = match std::env::var("SESSION_TIME") {
            Ok(time) => time
                .parse::<i64>()
                .context("SESSION_TIME cannot be parsed as an integer")?,
            Err(_) => 60 * 24,
        };
        if minutes <= 0 {
            bail!("SESSION_TIME must be a positive number of minutes");
        }

        let media_dir = PathBuf::from(
            std::env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".to_owned()),
        );

        let secret_key = match std::env::var("SECRET_KEY") {
            Ok(key) if key.len() < 64 => bail!("SECRET_KEY must be at least 64 bytes long"),
            Ok(key) => Some(key.into_bytes()),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            bind_address,
            session_time: chrono::Duration::minutes(minutes),
            media_dir,
            secret_key,
        })
    }
}

/// Shared application state handed to every worker through `web::Data`.
pub struct MainData {
    pub pool: DatabaseConnection,
    pub media: MediaStore,
    pub session_time: chrono::Duration,
}

impl MainData {
    pub fn new(pool: DatabaseConnection, config: &Config) -> Self {
        Self {
            pool,
            media: MediaStore::new(config.media_dir.to_owned()),
            session_time: config.session_time,
        }
    }
}
