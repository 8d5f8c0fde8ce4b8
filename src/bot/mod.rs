//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `commands`: the command set and the simple informational handlers
//! - `handlers`: classifies incoming messages and drives the conversation flow
//! - `keyboards`: reply keyboard construction for confirmation prompts
//! - `finalize`: the finalization pipeline with its cleanup guarantee
//! - `timeout`: the inactivity watcher task

pub mod commands;
pub mod finalize;
pub mod handlers;
pub mod keyboards;
pub mod timeout;

use crate::config::AppConfig;
use crate::localization::LocalizationManager;
use crate::questions::QuestionRepository;
use crate::rate_limit::RateLimiter;
use crate::render::DocumentRenderer;
use crate::session::SessionStore;
use crate::temp_store::TempPhotoStore;
use std::sync::Arc;

/// Shared dependencies injected into every handler.
///
/// Everything is constructed once in `main` and passed explicitly; there is
/// no module-level mutable state.
#[derive(Clone)]
pub struct BotDeps {
    pub config: Arc<AppConfig>,
    pub localization: Arc<LocalizationManager>,
    pub questions: Arc<QuestionRepository>,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub temp_store: Arc<TempPhotoStore>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

// Re-export main handler entry points for use in main.rs
pub use commands::Command;
pub use handlers::{command_handler, message_handler};
pub use timeout::spawn_timeout_watcher;
