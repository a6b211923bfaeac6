//! Runtime configuration, read from the environment once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Maximum raw size of a single incoming item (photo, document, or text).
pub const MAX_ITEM_SIZE: u64 = 20 * 1024 * 1024;

/// Maximum size of the compiled output document.
pub const MAX_DOCUMENT_SIZE: u64 = 50 * 1024 * 1024;

/// Wall-clock deadline for the office conversion subprocess.
pub const CONVERT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// The single administrator identity; all admin commands compare against
    /// this id exactly.
    pub admin_id: u64,
    pub users_file: PathBuf,
    pub stats_file: PathBuf,
    pub max_item_size: u64,
    pub max_document_size: u64,
    pub convert_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN must be set")?;
        let admin_id = env::var("ADMIN_ID")
            .context("ADMIN_ID must be set")?
            .parse::<u64>()
            .context("ADMIN_ID must be a numeric Telegram user id")?;
        let users_file = env::var("USERS_FILE").unwrap_or_else(|_| "users.json".to_string());
        let stats_file = env::var("STATS_FILE").unwrap_or_else(|_| "stats.json".to_string());

        Ok(Self {
            bot_token,
            admin_id,
            users_file: PathBuf::from(users_file),
            stats_file: PathBuf::from(stats_file),
            max_item_size: MAX_ITEM_SIZE,
            max_document_size: MAX_DOCUMENT_SIZE,
            convert_timeout: CONVERT_TIMEOUT,
        })
    }
}
