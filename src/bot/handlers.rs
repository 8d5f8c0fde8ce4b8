//! Message handling: classifies incoming Telegram updates into flow events,
//! runs the conversation state machine and executes the resulting effects.

use super::commands::{self, Command};
use super::keyboards::{self, ConfirmKind};
use super::{finalize, BotDeps};
use crate::errors::error_logging;
use crate::flow::{
    self, ConfirmReply, FlowContext, FlowEvent, FlowOutcome, FlowReply, Notice, PhotoRejection,
};
use crate::localization::{resolve_language, t_args_lang, t_lang};
use crate::questions::Question;
use crate::session::ConversationState;
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{FileId, User, UserId};
use tracing::{debug, info, warn};

/// Handle a recognized command
pub async fn command_handler(bot: Bot, msg: Message, cmd: Command, deps: BotDeps) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let lang = user_lang(&deps, &user);
    deps.sessions.touch(user.id);

    debug!(user_id = %user.id, command = ?cmd, "Handling command");
    match cmd {
        Command::Start => commands::handle_start_command(&bot, &msg, &deps.localization, &lang).await,
        Command::Help => commands::handle_help_command(&bot, &msg, &deps.localization, &lang).await,
        Command::Apply => {
            process_flow_event(&bot, msg.chat.id, &user, FlowEvent::Start, &deps, &lang).await
        }
        Command::Cancel => {
            process_flow_event(&bot, msg.chat.id, &user, FlowEvent::Cancel, &deps, &lang).await
        }
    }
}

/// Handle any non-command message
pub async fn message_handler(bot: Bot, msg: Message, deps: BotDeps) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    // No session, or an idle one: the message belongs to no conversation
    let state = deps
        .sessions
        .inspect(user.id, |s| s.state)
        .unwrap_or_default();
    if state == ConversationState::Idle {
        debug!(user_id = %user.id, "Message outside any conversation, ignoring");
        return Ok(());
    }

    deps.sessions.touch(user.id);
    let lang = user_lang(&deps, &user);
    let event = classify_message(&bot, &msg, state, &deps, &lang).await;
    process_flow_event(&bot, msg.chat.id, &user, event, &deps, &lang).await
}

/// Resolve the language for this user, preferring the session cache
fn user_lang(deps: &BotDeps, user: &User) -> String {
    if let Some(Some(cached)) = deps.sessions.inspect(user.id, |s| s.cached_lang.clone()) {
        return cached;
    }
    resolve_language(
        &deps.localization,
        deps.config.application.override_user_lang,
        user.language_code.as_deref(),
    )
}

/// Map an incoming message to a flow event, given the conversation state
async fn classify_message(
    bot: &Bot,
    msg: &Message,
    state: ConversationState,
    deps: &BotDeps,
    lang: &str,
) -> FlowEvent {
    match state {
        ConversationState::AskingQuestions => match msg.text() {
            // An unrecognized command is never an answer
            Some(text) if text.starts_with('/') => FlowEvent::NonTextInput,
            Some(text) => FlowEvent::Answer(text.to_string()),
            None => FlowEvent::NonTextInput,
        },
        ConversationState::AwaitingPhoto => classify_photo_input(bot, msg, deps).await,
        ConversationState::ConfirmCancelExisting => {
            classify_confirmation(msg, deps, ConfirmKind::RestartExisting, lang)
        }
        ConversationState::ConfirmGlobalCancel => {
            classify_confirmation(msg, deps, ConfirmKind::GlobalCancel, lang)
        }
        // Unreachable: the caller returns early on idle sessions
        ConversationState::Idle => FlowEvent::NonTextInput,
    }
}

/// Match a reply against the localized yes/no captions of the pending prompt
fn classify_confirmation(
    msg: &Message,
    deps: &BotDeps,
    kind: ConfirmKind,
    lang: &str,
) -> FlowEvent {
    let Some(text) = msg.text() else {
        return FlowEvent::NonTextInput;
    };
    let (yes, no) = keyboards::confirm_labels(&deps.localization, kind, lang);
    let reply = match text.trim() {
        t if t == yes => ConfirmReply::Yes,
        t if t == no => ConfirmReply::No,
        _ => ConfirmReply::Other,
    };
    FlowEvent::Confirm(reply)
}

/// Classify input while a photo is expected.
///
/// Size limits are checked against the Telegram metadata BEFORE anything is
/// downloaded; a valid photo is downloaded, sniffed and saved to the temp
/// store so the state machine only ever sees a usable local file.
async fn classify_photo_input(bot: &Bot, msg: &Message, deps: &BotDeps) -> FlowEvent {
    let max_bytes = deps.config.max_file_size_bytes();
    let user_id = msg.from.as_ref().map(|u| u.id);

    if let Some(photos) = msg.photo() {
        // Telegram sends several resolutions; the last one is the largest
        let Some(largest) = photos.last() else {
            return FlowEvent::PhotoRejected(PhotoRejection::WrongType);
        };

        if u64::from(largest.file.size) > max_bytes {
            warn!(user_id = ?user_id, size = largest.file.size, "Photo exceeds the size limit");
            return FlowEvent::PhotoRejected(PhotoRejection::TooLarge);
        }

        let bytes = match download_file(bot, largest.file.id.clone(), max_bytes).await {
            Ok(Downloaded::Bytes(bytes)) => bytes,
            Ok(Downloaded::TooLarge) => {
                warn!(user_id = ?user_id, "Photo download exceeded the size limit");
                return FlowEvent::PhotoRejected(PhotoRejection::TooLarge);
            }
            Err(e) => {
                error_logging::log_network_error(
                    &e,
                    "download_photo",
                    user_id.map(|id| id.0 as i64),
                );
                return FlowEvent::PhotoRejected(PhotoRejection::DownloadFailed);
            }
        };

        if image::guess_format(&bytes).is_err() {
            warn!(user_id = ?user_id, "Downloaded payload is not a recognizable image");
            return FlowEvent::PhotoRejected(PhotoRejection::WrongType);
        }

        let sequence = deps
            .sessions
            .inspect(user_id.unwrap_or(UserId(0)), |s| s.photo_paths.len())
            .unwrap_or(0);
        match deps
            .temp_store
            .save_photo(&bytes, user_id.map(|id| id.0).unwrap_or(0), sequence)
        {
            Ok(path) => {
                info!(user_id = ?user_id, path = %path.display(), "Photo saved");
                FlowEvent::PhotoSaved(path)
            }
            Err(e) => {
                error_logging::log_filesystem_error(&e, "save_photo", None);
                FlowEvent::PhotoRejected(PhotoRejection::DownloadFailed)
            }
        }
    } else if let Some(size) = attached_file_size(msg) {
        // Some other media type where a photo was expected; an oversized
        // file gets the size-specific rejection, not the generic one
        if u64::from(size) > max_bytes {
            FlowEvent::PhotoRejected(PhotoRejection::TooLarge)
        } else {
            FlowEvent::PhotoRejected(PhotoRejection::WrongType)
        }
    } else if let Some(text) = msg.text() {
        FlowEvent::Answer(text.to_string())
    } else {
        FlowEvent::NonTextInput
    }
}

/// File size of any non-photo attachment on the message
fn attached_file_size(msg: &Message) -> Option<u32> {
    msg.document()
        .map(|d| d.file.size)
        .or_else(|| msg.video().map(|v| v.file.size))
        .or_else(|| msg.animation().map(|a| a.file.size))
        .or_else(|| msg.audio().map(|a| a.file.size))
        .or_else(|| msg.voice().map(|v| v.file.size))
}

enum Downloaded {
    Bytes(Vec<u8>),
    TooLarge,
}

/// Download a file through the Bot API, double-checking the size limit
/// against the Content-Length header and the actual payload
async fn download_file(bot: &Bot, file_id: FileId, max_bytes: u64) -> Result<Downloaded> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = reqwest::get(&url).await?;
    if let Some(content_length) = response.content_length() {
        if content_length > max_bytes {
            return Ok(Downloaded::TooLarge);
        }
    }

    let bytes = response.bytes().await?;
    if bytes.len() as u64 > max_bytes {
        return Ok(Downloaded::TooLarge);
    }
    Ok(Downloaded::Bytes(bytes.to_vec()))
}

/// Run one event through the state machine and execute the result
pub(crate) async fn process_flow_event(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    event: FlowEvent,
    deps: &BotDeps,
    lang: &str,
) -> Result<()> {
    // The original behavior: an empty repository gets one reload attempt
    // when an application starts, so operators can fix the file live
    if matches!(event, FlowEvent::Start) && deps.questions.is_empty() {
        if let Err(e) = deps.questions.reload() {
            error_logging::log_config_error(&e, "questions_file", "reload_on_apply");
        }
    }

    let questions = deps.questions.snapshot();
    let ctx = FlowContext {
        questions: &questions,
        required_photos: deps.config.application.required_photo_count,
        max_file_size_mb: deps.config.application.max_file_size_mb,
        rate_limit_wait: deps.rate_limiter.remaining_cooldown(user.id),
    };

    // A freshly saved photo whose session vanished mid-download must not leak
    let saved_photo = match &event {
        FlowEvent::PhotoSaved(path) => Some(path.clone()),
        _ => None,
    };

    let (transition, finalize_data) = deps.sessions.with_session(user.id, |session| {
        if session.cached_lang.is_none() {
            session.cached_lang = Some(lang.to_string());
        }
        let transition = flow::on_event(session, event, &ctx);
        let finalize_data = matches!(transition.outcome, FlowOutcome::Finalize)
            .then(|| (session.answers.clone(), session.photo_paths.clone()));
        (transition, finalize_data)
    });

    send_replies(bot, chat_id, &transition.replies, &questions, deps, lang).await?;

    match transition.outcome {
        FlowOutcome::Continue => {}
        FlowOutcome::End => {
            if let Some(path) = saved_photo {
                deps.temp_store.discard(&path);
            }
            deps.sessions.remove_if_idle(user.id);
        }
        FlowOutcome::Discard => discard_attempt(deps, user.id),
        FlowOutcome::RestartAfterDiscard => {
            discard_attempt(deps, user.id);
            // Fresh entry after the old attempt is gone; the rate-limit
            // check runs again with a fresh context
            Box::pin(process_flow_event(
                bot,
                chat_id,
                user,
                FlowEvent::Start,
                deps,
                lang,
            ))
            .await?;
        }
        FlowOutcome::Finalize => {
            let (answers, photo_paths) = finalize_data.unwrap_or_default();
            finalize::finalize_application(bot, chat_id, user, deps, lang, answers, photo_paths)
                .await?;
        }
    }

    Ok(())
}

/// Delete the attempt's temp photos and drop the session
fn discard_attempt(deps: &BotDeps, user_id: UserId) {
    if let Some(session) = deps.sessions.remove(user_id) {
        deps.temp_store.cleanup(&session.photo_paths);
    }
}

/// Send the replies a transition produced, in order
pub(crate) async fn send_replies(
    bot: &Bot,
    chat_id: ChatId,
    replies: &[FlowReply],
    questions: &[Question],
    deps: &BotDeps,
    lang: &str,
) -> Result<()> {
    for reply in replies {
        match reply {
            FlowReply::AskQuestion { index } => {
                if let Some(question) = questions.get(*index) {
                    bot.send_message(chat_id, question.text.clone())
                        .reply_markup(keyboards::remove_keyboard())
                        .await?;
                }
            }
            FlowReply::Notice(notice) => {
                let (text, confirm) = notice_message(notice, deps, lang);
                match confirm {
                    Some(kind) => {
                        bot.send_message(chat_id, text)
                            .reply_markup(keyboards::confirm_keyboard(&deps.localization, kind, lang))
                            .await?
                    }
                    None => {
                        bot.send_message(chat_id, text)
                            .reply_markup(keyboards::remove_keyboard())
                            .await?
                    }
                };
            }
        }
    }
    Ok(())
}

/// Resolve a notice into localized text plus the keyboard it carries
fn notice_message(notice: &Notice, deps: &BotDeps, lang: &str) -> (String, Option<ConfirmKind>) {
    let loc = deps.localization.as_ref();
    match notice {
        Notice::ApplyIntro => (t_lang(loc, "apply-intro", lang), None),
        Notice::RateLimited { wait_minutes } => (
            t_args_lang(
                loc,
                "rate-limit-exceeded",
                &[("wait_minutes", wait_minutes.to_string())],
                lang,
            ),
            None,
        ),
        Notice::NoQuestionsConfigured => (t_lang(loc, "no-questions-configured", lang), None),
        Notice::AlreadyInApplication => (
            t_lang(loc, "already-in-application", lang),
            Some(ConfirmKind::RestartExisting),
        ),
        Notice::CancelPrompt => (
            t_lang(loc, "cancel-prompt", lang),
            Some(ConfirmKind::GlobalCancel),
        ),
        Notice::ContinueApplication => (t_lang(loc, "continue-current-application", lang), None),
        Notice::ApplicationCancelled => (t_lang(loc, "application-cancelled", lang), None),
        Notice::NoActiveApplication => (t_lang(loc, "no-active-application", lang), None),
        Notice::AskPhotoSingle => (t_lang(loc, "ask-photo-single", lang), None),
        Notice::AskPhotoInitial { total } => (
            t_args_lang(loc, "ask-photo-initial", &[("total", total.to_string())], lang),
            None,
        ),
        Notice::AskPhotoProgress { collected, total } => (
            t_args_lang(
                loc,
                "ask-photo-progress",
                &[
                    ("collected", collected.to_string()),
                    ("total", total.to_string()),
                ],
                lang,
            ),
            None,
        ),
        Notice::SendPhotoPlease => (t_lang(loc, "please-send-photo", lang), None),
        Notice::PhotoTooLarge { max_mb } => (
            t_args_lang(loc, "file-too-large", &[("max_mb", max_mb.to_string())], lang),
            None,
        ),
        Notice::PhotoDownloadFailed => (t_lang(loc, "photo-download-failed", lang), None),
        Notice::AllPhotosReceived => (t_lang(loc, "all-photos-received", lang), None),
        Notice::AnswerExpected => (t_lang(loc, "answer-expected", lang), None),
        Notice::TimedOut => (t_lang(loc, "timeout-message", lang), None),
        Notice::GenericError => (t_lang(loc, "generic-error", lang), None),
    }
}
