//! Inactivity watcher: force-terminates conversations whose users walked
//! away, independently of any new input.

use super::{handlers, BotDeps};
use crate::errors::error_logging;
use crate::flow::{self, FlowContext, FlowEvent, FlowOutcome};
use std::time::Duration;
use teloxide::prelude::*;
use tokio::task::JoinHandle;
use tracing::info;

/// Spawn the background task that times out idle conversations.
///
/// Expired sessions are removed from the store FIRST, then notified and
/// cleaned up. A message handler racing the watcher finds no session and
/// treats the user as idle, so cleanup can never run twice.
pub fn spawn_timeout_watcher(bot: Bot, deps: BotDeps) -> JoinHandle<()> {
    tokio::spawn(async move {
        let timeout = deps.config.conversation_timeout();
        let scan_every = Duration::from_secs(30).min(timeout);
        let mut interval = tokio::time::interval(scan_every);

        loop {
            interval.tick().await;

            let expired = deps.sessions.take_expired(timeout);
            if expired.is_empty() {
                continue;
            }

            let questions = deps.questions.snapshot();
            let ctx = FlowContext {
                questions: &questions,
                required_photos: deps.config.application.required_photo_count,
                max_file_size_mb: deps.config.application.max_file_size_mb,
                rate_limit_wait: None,
            };

            for (user_id, mut session) in expired {
                if !session.is_active() {
                    continue;
                }

                info!(user_id = %user_id, state = ?session.state, "Conversation timed out");

                let lang = session
                    .cached_lang
                    .clone()
                    .unwrap_or_else(|| deps.config.application.default_lang.clone());

                let transition = flow::on_event(&mut session, FlowEvent::Timeout, &ctx);

                // Notification failure is swallowed; cleanup still runs
                if let Err(e) = handlers::send_replies(
                    &bot,
                    ChatId::from(user_id),
                    &transition.replies,
                    &questions,
                    &deps,
                    &lang,
                )
                .await
                {
                    error_logging::log_network_error(
                        &e,
                        "send_timeout_notice",
                        Some(user_id.0 as i64),
                    );
                }

                if transition.outcome == FlowOutcome::Discard {
                    deps.temp_store.cleanup(&session.photo_paths);
                }
            }
        }
    })
}
