//! The application conversation state machine.
//!
//! This module is deliberately pure: [`on_event`] maps the user's current
//! [`Session`] and one inbound [`FlowEvent`] to a list of replies and an
//! outcome, without touching the network or the filesystem. The transport
//! layer classifies Telegram updates into events, renders [`FlowReply`]
//! values into localized messages and executes the [`FlowOutcome`]
//! (finalization, cleanup, restart). That split keeps every transition
//! directly unit-testable.

use crate::questions::Question;
use crate::session::{ConversationState, ResumeState, Session};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Per-message snapshot of everything a transition may depend on
pub struct FlowContext<'a> {
    /// Questions in presentation order, as of this message
    pub questions: &'a [Question],
    /// Number of photos required to complete an attempt
    pub required_photos: u32,
    /// Maximum accepted file size, for rejection message wording
    pub max_file_size_mb: u64,
    /// Remaining cooldown when the user is rate-limited, checked on entry
    pub rate_limit_wait: Option<Duration>,
}

/// The user's reply to a yes/no confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmReply {
    Yes,
    No,
    Other,
}

/// Why an incoming photo was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoRejection {
    /// Not a photo at all (document, video, sticker, ...)
    WrongType,
    /// Exceeds the configured size limit
    TooLarge,
    /// The download from the Bot API failed
    DownloadFailed,
}

/// One classified inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// `/apply`: enter or re-enter the application flow
    Start,
    /// A plain text message
    Answer(String),
    /// A message that is neither text nor a photo
    NonTextInput,
    /// A photo was downloaded and stored at the given path
    PhotoSaved(PathBuf),
    /// A photo-stage input was rejected before it reached the session
    PhotoRejected(PhotoRejection),
    /// A reply while a yes/no confirmation is pending
    Confirm(ConfirmReply),
    /// `/cancel`
    Cancel,
    /// Inactivity timeout, raised by the watcher
    Timeout,
}

/// A localized notice to send; the transport resolves the message key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ApplyIntro,
    RateLimited { wait_minutes: u64 },
    NoQuestionsConfigured,
    AlreadyInApplication,
    CancelPrompt,
    ContinueApplication,
    ApplicationCancelled,
    NoActiveApplication,
    AskPhotoSingle,
    AskPhotoInitial { total: u32 },
    AskPhotoProgress { collected: u32, total: u32 },
    SendPhotoPlease,
    PhotoTooLarge { max_mb: u64 },
    PhotoDownloadFailed,
    AllPhotosReceived,
    AnswerExpected,
    TimedOut,
    GenericError,
}

/// One outbound reply produced by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum FlowReply {
    /// Prompt the question at this index of the context's question list
    AskQuestion { index: usize },
    Notice(Notice),
}

/// What the transport must do after sending the replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The conversation continues; the session stays in the store
    Continue,
    /// All data collected: run the finalization pipeline
    Finalize,
    /// Delete temp photos and drop the session
    Discard,
    /// Discard, then process a fresh `Start` with a fresh context
    RestartAfterDiscard,
    /// No active attempt; drop the session entry if it is idle
    End,
}

/// The result of one transition
#[derive(Debug)]
pub struct Transition {
    pub replies: Vec<FlowReply>,
    pub outcome: FlowOutcome,
}

impl Transition {
    fn new(replies: Vec<FlowReply>, outcome: FlowOutcome) -> Self {
        Self { replies, outcome }
    }

    fn stay(replies: Vec<FlowReply>) -> Self {
        Self::new(replies, FlowOutcome::Continue)
    }

    fn notice(notice: Notice, outcome: FlowOutcome) -> Self {
        Self::new(vec![FlowReply::Notice(notice)], outcome)
    }
}

/// Apply one event to the session and produce the replies and outcome.
///
/// The session is mutated in place; callers own persistence and effects.
pub fn on_event(session: &mut Session, event: FlowEvent, ctx: &FlowContext<'_>) -> Transition {
    match event {
        FlowEvent::Start => on_start(session, ctx),
        FlowEvent::Cancel => on_cancel(session),
        FlowEvent::Timeout => on_timeout(session),
        other => match session.state {
            ConversationState::Idle => Transition::new(vec![], FlowOutcome::End),
            ConversationState::AskingQuestions => on_question_input(session, other, ctx),
            ConversationState::AwaitingPhoto => on_photo_input(session, other, ctx),
            ConversationState::ConfirmCancelExisting => on_confirm_restart(session, other, ctx),
            ConversationState::ConfirmGlobalCancel => on_confirm_cancel(session, other, ctx),
        },
    }
}

fn on_start(session: &mut Session, ctx: &FlowContext<'_>) -> Transition {
    match session.state {
        ConversationState::Idle => start_fresh(session, ctx),
        ConversationState::AskingQuestions | ConversationState::AwaitingPhoto => {
            // Starting over while an attempt is mid-flight needs explicit
            // confirmation; remember where to resume if the user declines.
            session.resume_state = Some(current_resume_state(session));
            session.state = ConversationState::ConfirmCancelExisting;
            Transition::stay(vec![FlowReply::Notice(Notice::AlreadyInApplication)])
        }
        ConversationState::ConfirmCancelExisting => {
            Transition::stay(vec![FlowReply::Notice(Notice::AlreadyInApplication)])
        }
        ConversationState::ConfirmGlobalCancel => {
            Transition::stay(vec![FlowReply::Notice(Notice::CancelPrompt)])
        }
    }
}

fn start_fresh(session: &mut Session, ctx: &FlowContext<'_>) -> Transition {
    if ctx.questions.is_empty() {
        return Transition::notice(Notice::NoQuestionsConfigured, FlowOutcome::End);
    }

    if let Some(wait) = ctx.rate_limit_wait {
        let wait_minutes = wait.as_secs() / 60 + 1;
        return Transition::notice(Notice::RateLimited { wait_minutes }, FlowOutcome::End);
    }

    session.reset_attempt();
    session.state = ConversationState::AskingQuestions;

    let mut transition = ask_current_question(session, ctx);
    transition
        .replies
        .insert(0, FlowReply::Notice(Notice::ApplyIntro));
    transition
}

/// Prompt the question at the current index, or move on to the photo stage
/// when the list is exhausted.
fn ask_current_question(session: &mut Session, ctx: &FlowContext<'_>) -> Transition {
    let index = session.current_question_index;
    match ctx.questions.get(index) {
        Some(question) => {
            session.current_question_id = Some(question.id.clone());
            Transition::stay(vec![FlowReply::AskQuestion { index }])
        }
        None => enter_photo_stage(session, ctx),
    }
}

fn enter_photo_stage(session: &mut Session, ctx: &FlowContext<'_>) -> Transition {
    session.state = ConversationState::AwaitingPhoto;
    session.awaiting_photo = true;

    if ctx.required_photos == 0 {
        // No photos required: skip the stage entirely, no empty prompt
        session.awaiting_photo = false;
        return Transition::new(vec![], FlowOutcome::Finalize);
    }

    Transition::stay(vec![FlowReply::Notice(photo_prompt(session, ctx))])
}

fn photo_prompt(session: &Session, ctx: &FlowContext<'_>) -> Notice {
    let collected = session.photo_paths.len() as u32;
    if ctx.required_photos == 1 {
        Notice::AskPhotoSingle
    } else if collected == 0 {
        Notice::AskPhotoInitial {
            total: ctx.required_photos,
        }
    } else {
        Notice::AskPhotoProgress {
            collected,
            total: ctx.required_photos,
        }
    }
}

fn on_question_input(session: &mut Session, event: FlowEvent, ctx: &FlowContext<'_>) -> Transition {
    match event {
        FlowEvent::Answer(text) => {
            if ctx.questions.is_empty() {
                // The repository was emptied mid-flight; nothing sensible to
                // resume into.
                warn!("Questions disappeared mid-conversation, ending attempt");
                return Transition::notice(Notice::NoQuestionsConfigured, FlowOutcome::Discard);
            }

            if let Some(question_id) = session.current_question_id.take() {
                session.answers.insert(question_id, text);
            }
            session.current_question_index += 1;
            ask_current_question(session, ctx)
        }
        // Anything that is not a text answer re-prompts the same question;
        // the index must not advance.
        _ => {
            let mut transition = ask_current_question(session, ctx);
            transition
                .replies
                .insert(0, FlowReply::Notice(Notice::AnswerExpected));
            transition
        }
    }
}

fn on_photo_input(session: &mut Session, event: FlowEvent, ctx: &FlowContext<'_>) -> Transition {
    match event {
        FlowEvent::PhotoSaved(path) => {
            session.photo_paths.push(path);
            let collected = session.photo_paths.len() as u32;
            if collected < ctx.required_photos {
                Transition::stay(vec![FlowReply::Notice(Notice::AskPhotoProgress {
                    collected,
                    total: ctx.required_photos,
                })])
            } else {
                session.awaiting_photo = false;
                Transition::notice(Notice::AllPhotosReceived, FlowOutcome::Finalize)
            }
        }
        FlowEvent::PhotoRejected(PhotoRejection::TooLarge) => Transition::stay(vec![
            FlowReply::Notice(Notice::PhotoTooLarge {
                max_mb: ctx.max_file_size_mb,
            }),
        ]),
        FlowEvent::PhotoRejected(PhotoRejection::DownloadFailed) => {
            Transition::stay(vec![FlowReply::Notice(Notice::PhotoDownloadFailed)])
        }
        // Wrong media type, plain text, stickers: same gentle re-prompt
        _ => Transition::stay(vec![FlowReply::Notice(Notice::SendPhotoPlease)]),
    }
}

fn on_confirm_restart(session: &mut Session, event: FlowEvent, ctx: &FlowContext<'_>) -> Transition {
    match event {
        FlowEvent::Confirm(ConfirmReply::Yes) => Transition::notice(
            Notice::ApplicationCancelled,
            FlowOutcome::RestartAfterDiscard,
        ),
        FlowEvent::Confirm(ConfirmReply::No) => {
            let mut transition = resume_attempt(session, ctx);
            transition
                .replies
                .insert(0, FlowReply::Notice(Notice::ContinueApplication));
            transition
        }
        _ => Transition::stay(vec![FlowReply::Notice(Notice::AlreadyInApplication)]),
    }
}

fn on_confirm_cancel(session: &mut Session, event: FlowEvent, ctx: &FlowContext<'_>) -> Transition {
    match event {
        FlowEvent::Confirm(ConfirmReply::Yes) => {
            Transition::notice(Notice::ApplicationCancelled, FlowOutcome::Discard)
        }
        FlowEvent::Confirm(ConfirmReply::No) => {
            let mut transition = resume_attempt(session, ctx);
            transition
                .replies
                .insert(0, FlowReply::Notice(Notice::ContinueApplication));
            transition
        }
        // Unrecognized answer: keep the remembered resume state and re-ask
        _ => Transition::stay(vec![FlowReply::Notice(Notice::CancelPrompt)]),
    }
}

/// Return to the state a declined cancellation interrupted.
///
/// `resume_state` is always set when a confirm state is entered; the
/// flag-inference branch below is a safety net for sessions that lost it,
/// and the generic-error branch covers sessions with nothing to recover.
fn resume_attempt(session: &mut Session, ctx: &FlowContext<'_>) -> Transition {
    let target = session.resume_state.take().or_else(|| {
        warn!("Resume state missing on declined cancel, inferring from session flags");
        infer_resume_state(session)
    });

    match target {
        Some(ResumeState::AwaitingPhoto) => enter_photo_stage(session, ctx),
        Some(ResumeState::AskingQuestions) => {
            session.state = ConversationState::AskingQuestions;
            // Same index as before the interruption: the pending question is
            // asked again, nothing is re-incremented.
            ask_current_question(session, ctx)
        }
        None => {
            warn!("No recoverable state after declined cancel, ending attempt");
            Transition::notice(Notice::GenericError, FlowOutcome::Discard)
        }
    }
}

fn infer_resume_state(session: &Session) -> Option<ResumeState> {
    if session.awaiting_photo {
        Some(ResumeState::AwaitingPhoto)
    } else if session.current_question_id.is_some()
        || session.current_question_index > 0
        || !session.answers.is_empty()
    {
        Some(ResumeState::AskingQuestions)
    } else {
        None
    }
}

fn current_resume_state(session: &Session) -> ResumeState {
    match session.state {
        ConversationState::AwaitingPhoto => ResumeState::AwaitingPhoto,
        _ => ResumeState::AskingQuestions,
    }
}

fn on_cancel(session: &mut Session) -> Transition {
    match session.state {
        ConversationState::Idle => {
            Transition::notice(Notice::NoActiveApplication, FlowOutcome::End)
        }
        ConversationState::AskingQuestions | ConversationState::AwaitingPhoto => {
            session.resume_state = Some(current_resume_state(session));
            session.state = ConversationState::ConfirmGlobalCancel;
            Transition::stay(vec![FlowReply::Notice(Notice::CancelPrompt)])
        }
        // Already in a confirmation: re-ask, the resume state is preserved
        ConversationState::ConfirmCancelExisting | ConversationState::ConfirmGlobalCancel => {
            session.state = ConversationState::ConfirmGlobalCancel;
            Transition::stay(vec![FlowReply::Notice(Notice::CancelPrompt)])
        }
    }
}

fn on_timeout(session: &mut Session) -> Transition {
    if !session.is_active() {
        return Transition::new(vec![], FlowOutcome::End);
    }
    Transition::notice(Notice::TimedOut, FlowOutcome::Discard)
}
