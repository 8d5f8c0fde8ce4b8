//! The finalization pipeline: render the finished application, distribute
//! it to admins, notify the user, and clean up on every exit path.

use super::{keyboards, BotDeps};
use crate::errors::error_logging;
use crate::localization::{t_args_lang, t_lang};
use crate::render::RenderRequest;
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use teloxide::prelude::*;
use teloxide::types::{InputFile, User};
use tracing::{info, warn};

/// Finalize one application attempt.
///
/// Whatever happens inside the pipeline (render failure, delivery failure,
/// an unexpected error), the temp photos are deleted and the session is
/// removed before this function returns.
pub async fn finalize_application(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    deps: &BotDeps,
    lang: &str,
    answers: HashMap<String, String>,
    photo_paths: Vec<PathBuf>,
) -> Result<()> {
    info!(
        user_id = %user.id,
        answers = answers.len(),
        photos = photo_paths.len(),
        "Finalizing application"
    );

    let result = run_pipeline(bot, chat_id, user, deps, lang, &answers, &photo_paths).await;

    if let Err(e) = &result {
        error_logging::log_internal_error(
            e,
            "finalize",
            "finalize_application",
            Some(user.id.0 as i64),
        );
        // Best-effort failure notice; cleanup below must still run
        let _ = bot
            .send_message(chat_id, t_lang(&deps.localization, "application-failed", lang))
            .reply_markup(keyboards::remove_keyboard())
            .await;
    }

    deps.temp_store.cleanup(&photo_paths);
    deps.sessions.remove(user.id);

    Ok(())
}

async fn run_pipeline(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    deps: &BotDeps,
    lang: &str,
    answers: &HashMap<String, String>,
    photo_paths: &[PathBuf],
) -> Result<()> {
    let request = RenderRequest {
        user_id: user.id.0,
        username: user.username.as_deref(),
        answers,
        photo_paths,
        lang,
    };

    let document_path = match deps.renderer.render(&request) {
        Ok(path) => path,
        Err(e) => {
            error_logging::log_render_error(&e, "render_application_document", user.id.0 as i64);
            bot.send_message(chat_id, t_lang(&deps.localization, "application-failed", lang))
                .reply_markup(keyboards::remove_keyboard())
                .await?;
            // Render failure ends the attempt: no distribution, no
            // rate-limit record
            return Ok(());
        }
    };

    if deps.config.application.send_to_admins {
        distribute_to_admins(bot, user, deps, lang, &document_path).await;
    } else {
        info!(
            user_id = %user.id,
            path = %document_path.display(),
            "Admin distribution disabled, document kept on disk"
        );
    }

    bot.send_message(
        chat_id,
        t_lang(&deps.localization, "application-submitted", lang),
    )
    .reply_markup(keyboards::remove_keyboard())
    .await?;

    // The only rate-limit mutation, and only after full success
    deps.rate_limiter.record_submission(user.id);

    Ok(())
}

/// Send the rendered document to every configured admin.
///
/// Each delivery is independent: one failing admin does not stop the others
/// and does not fail the finalize.
async fn distribute_to_admins(
    bot: &Bot,
    user: &User,
    deps: &BotDeps,
    lang: &str,
    document_path: &Path,
) {
    let admin_ids = deps.config.admin_ids();
    if admin_ids.is_empty() {
        warn!(
            user_id = %user.id,
            "No valid admin ids configured, application document not distributed"
        );
        return;
    }

    let loc = deps.localization.as_ref();
    let username_display = user
        .username
        .clone()
        .unwrap_or_else(|| t_lang(loc, "username-placeholder", lang));
    let caption = t_args_lang(
        loc,
        "admin-notification",
        &[
            ("username", username_display),
            ("user_id", user.id.to_string()),
            (
                "submission_time",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ],
        lang,
    );

    for admin_id in admin_ids {
        match bot
            .send_document(ChatId(admin_id), InputFile::file(document_path.to_path_buf()))
            .caption(caption.clone())
            .await
        {
            Ok(_) => info!(admin_id, user_id = %user.id, "Sent application document to admin"),
            Err(e) => error_logging::log_delivery_error(&e, admin_id, user.id.0 as i64),
        }
    }
}
