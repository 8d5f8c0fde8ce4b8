//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! It supports loading from environment variables, validation, and provides
//! a clean interface for accessing configuration throughout the application.
//!
//! Every default value (cooldown, photo count, file size, timeout) is
//! resolved here and nowhere else; call sites read the resolved config.

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Bot-specific configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token
    pub token: String,
    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            http_timeout_secs: 30,
        }
    }
}

impl BotConfig {
    /// Validate bot configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.token.trim().is_empty() {
            return Err(AppError::Config("Bot token cannot be empty".to_string()));
        }

        // Basic bot token format validation
        if !self.token.contains(':') {
            return Err(AppError::Config(
                "Bot token format is invalid. Expected format: 'bot_id:bot_token'".to_string(),
            ));
        }

        let parts: Vec<&str> = self.token.split(':').collect();
        if parts.len() != 2 {
            return Err(AppError::Config(
                "Bot token format is invalid. Expected format: 'bot_id:bot_token'".to_string(),
            ));
        }

        if parts[0].parse::<u64>().is_err() {
            return Err(AppError::Config(
                "Bot token bot ID must be numeric".to_string(),
            ));
        }

        if parts[1].len() < 20 {
            return Err(AppError::Config(
                "Bot token appears to be too short. Please verify it's a valid token".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("HTTP timeout cannot be 0".to_string()));
        }

        if self.http_timeout_secs > 300 {
            return Err(AppError::Config(
                "HTTP timeout cannot be greater than 300 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

/// Application-flow configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Number of photos an applicant must provide (0 skips the photo stage)
    pub required_photo_count: u32,
    /// Maximum accepted file size for incoming media, in megabytes
    pub max_file_size_mb: u64,
    /// Cooldown between successful submissions per user, in seconds
    pub rate_limit_secs: u64,
    /// Inactivity timeout for an in-progress conversation, in seconds
    pub conversation_timeout_secs: u64,
    /// Comma-separated admin user ids receiving finished applications
    pub admin_user_ids: String,
    /// Whether finished applications are distributed to admins
    pub send_to_admins: bool,
    /// Path of the questions repository file
    pub questions_file: String,
    /// Directory for temporary photo downloads
    pub temp_photo_dir: String,
    /// Directory for rendered application documents
    pub application_dir: String,
    /// Default bot language
    pub default_lang: String,
    /// When true, the configured default language overrides the Telegram client language
    pub override_user_lang: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            required_photo_count: 1,
            max_file_size_mb: 10,
            rate_limit_secs: 600, // 10 minutes
            conversation_timeout_secs: 1200, // 20 minutes
            admin_user_ids: String::new(),
            send_to_admins: true,
            questions_file: "questions.json".to_string(),
            temp_photo_dir: "temp_photos".to_string(),
            application_dir: "applications".to_string(),
            default_lang: "en".to_string(),
            override_user_lang: true,
        }
    }
}

impl ApplicationConfig {
    /// Validate application-flow configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.required_photo_count > 10 {
            return Err(AppError::Config(
                "Required photo count cannot be greater than 10".to_string(),
            ));
        }

        if self.max_file_size_mb == 0 {
            return Err(AppError::Config("Max file size cannot be 0".to_string()));
        }

        if self.max_file_size_mb > 50 {
            return Err(AppError::Config(
                "Max file size cannot be greater than 50 MB".to_string(),
            ));
        }

        if self.conversation_timeout_secs == 0 {
            return Err(AppError::Config(
                "Conversation timeout cannot be 0".to_string(),
            ));
        }

        if self.conversation_timeout_secs > 86_400 {
            return Err(AppError::Config(
                "Conversation timeout cannot be greater than 24 hours".to_string(),
            ));
        }

        if self.rate_limit_secs > 86_400 {
            return Err(AppError::Config(
                "Rate limit cooldown cannot be greater than 24 hours".to_string(),
            ));
        }

        if self.questions_file.trim().is_empty() {
            return Err(AppError::Config(
                "Questions file path cannot be empty".to_string(),
            ));
        }

        if self.temp_photo_dir.trim().is_empty() {
            return Err(AppError::Config(
                "Temp photo directory cannot be empty".to_string(),
            ));
        }

        if self.application_dir.trim().is_empty() {
            return Err(AppError::Config(
                "Application directory cannot be empty".to_string(),
            ));
        }

        if self.default_lang.trim().is_empty() {
            return Err(AppError::Config(
                "Default language cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Bot configuration
    pub bot: BotConfig,
    /// Application-flow configuration
    pub application: ApplicationConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        config.bot.token = env::var("TELEGRAM_BOT_TOKEN").map_err(|_| {
            AppError::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        config.bot.http_timeout_secs = env::var("HTTP_CLIENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| {
                AppError::Config("HTTP_CLIENT_TIMEOUT_SECS must be a valid number".to_string())
            })?;

        config.application.required_photo_count = env::var("APPLICATION_PHOTO_COUNT")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| {
                AppError::Config("APPLICATION_PHOTO_COUNT must be a valid number".to_string())
            })?;
        config.application.max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| AppError::Config("MAX_FILE_SIZE_MB must be a valid number".to_string()))?;
        config.application.rate_limit_secs = env::var("RATE_LIMIT_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .map_err(|_| AppError::Config("RATE_LIMIT_SECS must be a valid number".to_string()))?;
        config.application.conversation_timeout_secs = env::var("CONVERSATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "1200".to_string())
            .parse()
            .map_err(|_| {
                AppError::Config("CONVERSATION_TIMEOUT_SECS must be a valid number".to_string())
            })?;
        config.application.admin_user_ids =
            env::var("ADMIN_USER_IDS").unwrap_or_else(|_| String::new());
        config.application.send_to_admins = env::var("SEND_TO_ADMINS")
            .unwrap_or_else(|_| "true".to_string())
            .to_lowercase()
            == "true";
        config.application.questions_file =
            env::var("QUESTIONS_FILE").unwrap_or_else(|_| "questions.json".to_string());
        config.application.temp_photo_dir =
            env::var("TEMP_PHOTO_DIR").unwrap_or_else(|_| "temp_photos".to_string());
        config.application.application_dir =
            env::var("APPLICATION_DIR").unwrap_or_else(|_| "applications".to_string());
        config.application.default_lang =
            env::var("DEFAULT_LANG").unwrap_or_else(|_| "en".to_string());
        config.application.override_user_lang = env::var("OVERRIDE_USER_LANG")
            .unwrap_or_else(|_| "true".to_string())
            .to_lowercase()
            == "true";

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.bot.validate()?;
        self.application.validate()?;
        Ok(())
    }

    /// Parse the configured admin id list, ignoring blank and non-numeric entries.
    ///
    /// This is the single resolution point for admin ids; the finalization
    /// pipeline logs a warning when the result is empty.
    pub fn admin_ids(&self) -> Vec<i64> {
        self.application
            .admin_user_ids
            .split(',')
            .filter_map(|entry| entry.trim().parse::<i64>().ok())
            .collect()
    }

    /// Maximum accepted incoming file size in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.application.max_file_size_mb * 1024 * 1024
    }

    /// Cooldown between successful submissions
    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.application.rate_limit_secs)
    }

    /// Inactivity timeout for in-progress conversations
    pub fn conversation_timeout(&self) -> Duration {
        Duration::from_secs(self.application.conversation_timeout_secs)
    }

    /// Path of the questions repository file
    pub fn questions_path(&self) -> PathBuf {
        PathBuf::from(&self.application.questions_file)
    }

    /// Root directory for temporary photo downloads
    pub fn temp_photo_path(&self) -> PathBuf {
        PathBuf::from(&self.application.temp_photo_dir)
    }

    /// Output directory for rendered application documents
    pub fn application_path(&self) -> PathBuf {
        PathBuf::from(&self.application.application_dir)
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: bot_token=[REDACTED], photos={}, max_file_size_mb={}, rate_limit_secs={}, conversation_timeout_secs={}, send_to_admins={}, admins={}, default_lang={}",
            self.application.required_photo_count,
            self.application.max_file_size_mb,
            self.application.rate_limit_secs,
            self.application.conversation_timeout_secs,
            self.application.send_to_admins,
            self.admin_ids().len(),
            self.application.default_lang
        )
    }
}
