//! # Application Bot
//!
//! A Telegram bot that collects applications through a conversational flow:
//! an ordered list of configurable questions, a configurable number of
//! photos, and a rendered document distributed to administrators. The core
//! is a pure conversation state machine with strict rate-limiting and
//! temp-file lifecycle guarantees.

pub mod bot;
pub mod config;
pub mod errors;
pub mod flow;
pub mod localization;
pub mod questions;
pub mod rate_limit;
pub mod render;
pub mod session;
pub mod temp_store;

// Re-export types for easier access
pub use flow::{ConfirmReply, FlowContext, FlowEvent, FlowOutcome, FlowReply, Notice, Transition};
pub use session::{ConversationState, ResumeState, Session, SessionStore};
