//! Scenario tests for the conversation state machine.
//!
//! These drive `flow::on_event` directly, the way the dispatcher does, and
//! assert on session state and produced replies. No network involved.

use application_bot::flow::{
    self, ConfirmReply, FlowContext, FlowEvent, FlowOutcome, FlowReply, Notice, PhotoRejection,
    Transition,
};
use application_bot::questions::Question;
use application_bot::session::{ConversationState, ResumeState, Session};
use std::path::PathBuf;
use std::time::Duration;

fn make_questions(count: usize) -> Vec<Question> {
    (0..count)
        .map(|i| Question {
            id: format!("q{i}"),
            text: format!("Question {i}?"),
        })
        .collect()
}

fn ctx<'a>(questions: &'a [Question], required_photos: u32) -> FlowContext<'a> {
    FlowContext {
        questions,
        required_photos,
        max_file_size_mb: 10,
        rate_limit_wait: None,
    }
}

fn has_notice(transition: &Transition, notice: &Notice) -> bool {
    transition
        .replies
        .iter()
        .any(|r| matches!(r, FlowReply::Notice(n) if n == notice))
}

fn asks_question(transition: &Transition, index: usize) -> bool {
    transition
        .replies
        .iter()
        .any(|r| matches!(r, FlowReply::AskQuestion { index: i } if *i == index))
}

#[test]
fn full_application_with_one_photo() {
    let questions = make_questions(3);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    // Entry: intro plus the first question
    let t = flow::on_event(&mut session, FlowEvent::Start, &ctx);
    assert_eq!(t.outcome, FlowOutcome::Continue);
    assert_eq!(session.state, ConversationState::AskingQuestions);
    assert!(has_notice(&t, &Notice::ApplyIntro));
    assert!(asks_question(&t, 0));
    assert_eq!(session.current_question_id.as_deref(), Some("q0"));

    // Answer all three questions
    for i in 0..3 {
        let t = flow::on_event(
            &mut session,
            FlowEvent::Answer(format!("answer {i}")),
            &ctx,
        );
        if i < 2 {
            assert!(asks_question(&t, i + 1));
            assert_eq!(t.outcome, FlowOutcome::Continue);
        } else {
            // Question list exhausted: photo stage
            assert_eq!(session.state, ConversationState::AwaitingPhoto);
            assert!(has_notice(&t, &Notice::AskPhotoSingle));
        }
    }

    // Answers are stored verbatim under their question ids
    assert_eq!(session.answers.len(), 3);
    assert_eq!(session.answers["q0"], "answer 0");
    assert_eq!(session.answers["q1"], "answer 1");
    assert_eq!(session.answers["q2"], "answer 2");

    // One valid photo completes the attempt
    let t = flow::on_event(
        &mut session,
        FlowEvent::PhotoSaved(PathBuf::from("photo_0.jpg")),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::Finalize);
    assert!(has_notice(&t, &Notice::AllPhotosReceived));
    assert_eq!(session.photo_paths.len(), 1);
}

#[test]
fn non_text_input_reprompts_same_question() {
    let questions = make_questions(3);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    flow::on_event(&mut session, FlowEvent::Answer("first".into()), &ctx);
    assert_eq!(session.current_question_index, 1);

    // A voice message while a text answer is expected
    let t = flow::on_event(&mut session, FlowEvent::NonTextInput, &ctx);
    assert_eq!(t.outcome, FlowOutcome::Continue);
    assert!(has_notice(&t, &Notice::AnswerExpected));
    assert!(asks_question(&t, 1));

    // Index unchanged, nothing stored for the pending question
    assert_eq!(session.current_question_index, 1);
    assert_eq!(session.answers.len(), 1);
}

#[test]
fn declined_global_cancel_resumes_same_question() {
    let questions = make_questions(3);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    flow::on_event(&mut session, FlowEvent::Answer("first".into()), &ctx);

    let t = flow::on_event(&mut session, FlowEvent::Cancel, &ctx);
    assert_eq!(session.state, ConversationState::ConfirmGlobalCancel);
    assert_eq!(session.resume_state, Some(ResumeState::AskingQuestions));
    assert!(has_notice(&t, &Notice::CancelPrompt));

    let t = flow::on_event(
        &mut session,
        FlowEvent::Confirm(ConfirmReply::No),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::Continue);
    assert!(has_notice(&t, &Notice::ContinueApplication));
    // The same question is asked again, the index was not re-incremented
    assert!(asks_question(&t, 1));
    assert_eq!(session.state, ConversationState::AskingQuestions);
    assert_eq!(session.current_question_index, 1);
}

#[test]
fn confirmed_global_cancel_discards_attempt() {
    let questions = make_questions(2);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    flow::on_event(&mut session, FlowEvent::Cancel, &ctx);

    let t = flow::on_event(
        &mut session,
        FlowEvent::Confirm(ConfirmReply::Yes),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::Discard);
    assert!(has_notice(&t, &Notice::ApplicationCancelled));
}

#[test]
fn unrecognized_cancel_reply_keeps_resume_state() {
    let questions = make_questions(3);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    flow::on_event(&mut session, FlowEvent::Cancel, &ctx);
    assert_eq!(session.resume_state, Some(ResumeState::AskingQuestions));

    // "maybe" is neither yes nor no: re-ask without losing the resume state
    let t = flow::on_event(
        &mut session,
        FlowEvent::Confirm(ConfirmReply::Other),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::Continue);
    assert!(has_notice(&t, &Notice::CancelPrompt));
    assert_eq!(session.resume_state, Some(ResumeState::AskingQuestions));

    // Declining afterwards still resumes correctly
    let t = flow::on_event(
        &mut session,
        FlowEvent::Confirm(ConfirmReply::No),
        &ctx,
    );
    assert!(asks_question(&t, 0));
}

#[test]
fn two_photo_collection_reports_progress() {
    let questions = make_questions(1);
    let ctx = ctx(&questions, 2);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    let t = flow::on_event(&mut session, FlowEvent::Answer("done".into()), &ctx);
    assert!(has_notice(&t, &Notice::AskPhotoInitial { total: 2 }));

    let t = flow::on_event(
        &mut session,
        FlowEvent::PhotoSaved(PathBuf::from("a.jpg")),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::Continue);
    assert!(has_notice(
        &t,
        &Notice::AskPhotoProgress {
            collected: 1,
            total: 2
        }
    ));

    let t = flow::on_event(
        &mut session,
        FlowEvent::PhotoSaved(PathBuf::from("b.jpg")),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::Finalize);
    assert_eq!(session.photo_paths.len(), 2);
}

#[test]
fn restart_confirmation_begins_fresh_attempt() {
    let questions = make_questions(3);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    flow::on_event(&mut session, FlowEvent::Answer("old answer".into()), &ctx);

    // A second /apply mid-flight requires explicit confirmation
    let t = flow::on_event(&mut session, FlowEvent::Start, &ctx);
    assert_eq!(session.state, ConversationState::ConfirmCancelExisting);
    assert!(has_notice(&t, &Notice::AlreadyInApplication));

    let t = flow::on_event(
        &mut session,
        FlowEvent::Confirm(ConfirmReply::Yes),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::RestartAfterDiscard);

    // The transport discards the session and re-enters with a fresh one
    let mut fresh = Session::default();
    let t = flow::on_event(&mut fresh, FlowEvent::Start, &ctx);
    assert_eq!(fresh.state, ConversationState::AskingQuestions);
    assert_eq!(fresh.current_question_index, 0);
    assert!(fresh.answers.is_empty());
    assert!(asks_question(&t, 0));
}

#[test]
fn declined_restart_resumes_photo_stage() {
    let questions = make_questions(1);
    let ctx = ctx(&questions, 2);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    flow::on_event(&mut session, FlowEvent::Answer("done".into()), &ctx);
    flow::on_event(
        &mut session,
        FlowEvent::PhotoSaved(PathBuf::from("a.jpg")),
        &ctx,
    );
    assert_eq!(session.state, ConversationState::AwaitingPhoto);

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    assert_eq!(session.state, ConversationState::ConfirmCancelExisting);
    assert_eq!(session.resume_state, Some(ResumeState::AwaitingPhoto));

    let t = flow::on_event(
        &mut session,
        FlowEvent::Confirm(ConfirmReply::No),
        &ctx,
    );
    assert_eq!(session.state, ConversationState::AwaitingPhoto);
    // One photo already collected: the progress wording is used
    assert!(has_notice(
        &t,
        &Notice::AskPhotoProgress {
            collected: 1,
            total: 2
        }
    ));
    assert_eq!(session.photo_paths.len(), 1);
}

#[test]
fn rate_limited_entry_is_rejected() {
    let questions = make_questions(2);
    let mut ctx = ctx(&questions, 1);
    ctx.rate_limit_wait = Some(Duration::from_secs(300));
    let mut session = Session::default();

    let t = flow::on_event(&mut session, FlowEvent::Start, &ctx);
    assert_eq!(t.outcome, FlowOutcome::End);
    assert!(has_notice(&t, &Notice::RateLimited { wait_minutes: 6 }));
    assert_eq!(session.state, ConversationState::Idle);
}

#[test]
fn entry_without_questions_is_rejected() {
    let questions: Vec<Question> = vec![];
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    let t = flow::on_event(&mut session, FlowEvent::Start, &ctx);
    assert_eq!(t.outcome, FlowOutcome::End);
    assert!(has_notice(&t, &Notice::NoQuestionsConfigured));
}

#[test]
fn zero_required_photos_skips_photo_stage() {
    let questions = make_questions(1);
    let ctx = ctx(&questions, 0);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    let t = flow::on_event(&mut session, FlowEvent::Answer("only".into()), &ctx);

    // Straight to finalization, no photo prompt of any kind
    assert_eq!(t.outcome, FlowOutcome::Finalize);
    assert!(!has_notice(&t, &Notice::AskPhotoSingle));
    assert!(!has_notice(&t, &Notice::AskPhotoInitial { total: 0 }));
}

#[test]
fn photo_rejections_do_not_advance_anything() {
    let questions = make_questions(1);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    flow::on_event(&mut session, FlowEvent::Answer("done".into()), &ctx);

    let t = flow::on_event(
        &mut session,
        FlowEvent::PhotoRejected(PhotoRejection::TooLarge),
        &ctx,
    );
    assert!(has_notice(&t, &Notice::PhotoTooLarge { max_mb: 10 }));

    let t = flow::on_event(
        &mut session,
        FlowEvent::PhotoRejected(PhotoRejection::WrongType),
        &ctx,
    );
    assert!(has_notice(&t, &Notice::SendPhotoPlease));

    let t = flow::on_event(&mut session, FlowEvent::Answer("text".into()), &ctx);
    assert!(has_notice(&t, &Notice::SendPhotoPlease));

    assert_eq!(session.state, ConversationState::AwaitingPhoto);
    assert!(session.photo_paths.is_empty());
}

#[test]
fn missing_resume_state_falls_back_to_session_flags() {
    let questions = make_questions(2);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &ctx);
    flow::on_event(&mut session, FlowEvent::Answer("a".into()), &ctx);
    flow::on_event(&mut session, FlowEvent::Answer("b".into()), &ctx);
    assert!(session.awaiting_photo);

    // Simulate a session that lost its resume marker
    session.state = ConversationState::ConfirmGlobalCancel;
    session.resume_state = None;

    let t = flow::on_event(
        &mut session,
        FlowEvent::Confirm(ConfirmReply::No),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::Continue);
    assert_eq!(session.state, ConversationState::AwaitingPhoto);
}

#[test]
fn unrecoverable_resume_ends_with_generic_error() {
    let questions = make_questions(2);
    let ctx = ctx(&questions, 1);

    // A confirm state with no attempt traces at all
    let mut session = Session {
        state: ConversationState::ConfirmGlobalCancel,
        ..Default::default()
    };

    let t = flow::on_event(
        &mut session,
        FlowEvent::Confirm(ConfirmReply::No),
        &ctx,
    );
    assert_eq!(t.outcome, FlowOutcome::Discard);
    assert!(has_notice(&t, &Notice::GenericError));
}

#[test]
fn cancel_without_active_attempt() {
    let questions = make_questions(2);
    let ctx = ctx(&questions, 1);
    let mut session = Session::default();

    let t = flow::on_event(&mut session, FlowEvent::Cancel, &ctx);
    assert_eq!(t.outcome, FlowOutcome::End);
    assert!(has_notice(&t, &Notice::NoActiveApplication));
}

#[test]
fn timeout_is_an_unconditional_terminal_transition() {
    let questions = make_questions(2);
    let ctx = ctx(&questions, 1);

    for state in [
        ConversationState::AskingQuestions,
        ConversationState::AwaitingPhoto,
        ConversationState::ConfirmCancelExisting,
        ConversationState::ConfirmGlobalCancel,
    ] {
        let mut session = Session {
            state,
            ..Default::default()
        };
        let t = flow::on_event(&mut session, FlowEvent::Timeout, &ctx);
        assert_eq!(t.outcome, FlowOutcome::Discard, "state {state:?}");
        assert!(has_notice(&t, &Notice::TimedOut));
    }

    // An idle session times out silently
    let mut idle = Session::default();
    let t = flow::on_event(&mut idle, FlowEvent::Timeout, &ctx);
    assert_eq!(t.outcome, FlowOutcome::End);
    assert!(t.replies.is_empty());
}

#[test]
fn questions_emptied_mid_flight_end_the_attempt() {
    let questions = make_questions(2);
    let full_ctx = ctx(&questions, 1);
    let mut session = Session::default();

    flow::on_event(&mut session, FlowEvent::Start, &full_ctx);

    let emptied: Vec<Question> = vec![];
    let empty_ctx = ctx(&emptied, 1);
    let t = flow::on_event(&mut session, FlowEvent::Answer("a".into()), &empty_ctx);
    assert_eq!(t.outcome, FlowOutcome::Discard);
    assert!(has_notice(&t, &Notice::NoQuestionsConfigured));
}
