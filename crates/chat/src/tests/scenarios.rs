//! End-to-end chat scenarios over the local pipeline.

use super::support::{harness, Reply, REMISS_2019_TEXT, REMISS_2023_TEXT};
use crate::feedback::{FeedbackKey, FeedbackLog, FeedbackStatus, Judgment};
use crate::generator::BACKEND_ERROR_PREFIX;
use crate::types::Role;
use cosmic_core::config::RetryPolicy;
use cosmic_core::AppError;
use cosmic_prompt::NOT_FOUND_ANSWER;

const QUESTION: &str = "Hur skapar jag en remiss?";
const CLARIFICATION: &str = "Jag menar för en patient under 18 år";

#[tokio::test]
async fn scenario_a_answer_follows_one_document_and_cites_it() {
    let mut h = harness(Reply::FirstPassage, RetryPolicy::Reuse).await;

    let delta = h
        .pipeline
        .on_submit_question(&mut h.session, QUESTION)
        .await
        .unwrap();

    assert_eq!(delta.messages.len(), 2);
    assert_eq!(delta.messages[0].message.role, Role::User);
    assert_eq!(delta.messages[0].message.content, QUESTION);

    let answer = delta.answer().unwrap();
    let sources = answer.sources();
    assert_eq!(sources.len(), 2, "both documents match the question");

    let top = sources[0].title();
    let (own, other) = if sources[0].text == REMISS_2023_TEXT {
        (REMISS_2023_TEXT, REMISS_2019_TEXT)
    } else {
        (REMISS_2019_TEXT, REMISS_2023_TEXT)
    };

    assert!(answer.content.contains(own));
    assert!(!answer.content.contains(other));
    assert!(answer.content.ends_with(&format!("KÄLLA: {}", top)));

    let prompt = h.llm.prompt(0);
    assert!(prompt.contains(REMISS_2023_TEXT) && prompt.contains(REMISS_2019_TEXT));
    assert!(prompt.contains("Blanda aldrig steg"));
}

#[tokio::test]
async fn scenario_b_no_matching_passage_is_not_found() {
    let mut h = harness(Reply::FirstPassage, RetryPolicy::Reuse).await;

    let delta = h
        .pipeline
        .on_submit_question(&mut h.session, "Vilken färg har himlen?")
        .await
        .unwrap();

    let answer = delta.answer().unwrap();
    assert_eq!(answer.content, NOT_FOUND_ANSWER);
    assert!(!answer.content.contains("KÄLLA:"));
    assert!(answer.sources.is_none());
    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test]
async fn scenario_c_clarification_regenerates_in_same_conversation() {
    let mut h = harness(Reply::FirstPassage, RetryPolicy::Reuse).await;

    let first = h
        .pipeline
        .on_submit_question(&mut h.session, QUESTION)
        .await
        .unwrap();
    let answer_index = first.messages[1].index;

    let judged = h
        .pipeline
        .on_submit_feedback(&mut h.session, answer_index, 0, Judgment::Negative)
        .await
        .unwrap();
    assert_eq!(judged.feedback.len(), 1);

    let retry = h
        .pipeline
        .on_submit_clarification(&mut h.session, answer_index, 0, CLARIFICATION)
        .await
        .unwrap();

    assert_eq!(retry.conversation_id, first.conversation_id);
    assert_eq!(retry.feedback.len(), 1);
    assert_eq!(retry.feedback[0].clarification.as_deref(), Some(CLARIFICATION));
    assert_eq!(retry.feedback[0].question, QUESTION);

    let messages = h.session.active_messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].role, Role::User);
    assert_eq!(messages[2].content, CLARIFICATION);
    assert_eq!(messages[3].role, Role::Assistant);
    assert!(messages[3].content.contains("KÄLLA:"));

    // New generation, with the original exchange in the transcript
    assert_eq!(h.llm.calls(), 2);
    let prompt = h.llm.prompt(1);
    assert!(prompt.contains(&format!("Användare: {}", QUESTION)));
    assert!(prompt.contains(&format!("FRÅGA: {}", CLARIFICATION)));

    // Reuse keeps the judged answer's passages
    assert_eq!(messages[3].sources(), messages[1].sources());

    let records = h.feedback.records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].clarification, None);
    assert_eq!(records[1].feedback, Judgment::Negative);
}

#[tokio::test]
async fn clarification_with_reretrieve_policy() {
    let mut h = harness(Reply::FirstPassage, RetryPolicy::Reretrieve).await;

    h.pipeline
        .on_submit_question(&mut h.session, QUESTION)
        .await
        .unwrap();
    h.pipeline
        .on_submit_feedback(&mut h.session, 1, 0, Judgment::Negative)
        .await
        .unwrap();
    let retry = h
        .pipeline
        .on_submit_clarification(&mut h.session, 1, 0, CLARIFICATION)
        .await
        .unwrap();

    // The combined query still finds the referral documents
    let answer = retry.answer().unwrap();
    assert!(!answer.sources().is_empty());
    assert_eq!(h.llm.calls(), 2);
}

#[tokio::test]
async fn positive_feedback_twice_writes_one_record() {
    let mut h = harness(Reply::FirstPassage, RetryPolicy::Reuse).await;
    h.pipeline
        .on_submit_question(&mut h.session, QUESTION)
        .await
        .unwrap();

    let first = h
        .pipeline
        .on_submit_feedback(&mut h.session, 1, 0, Judgment::Positive)
        .await
        .unwrap();
    let second = h
        .pipeline
        .on_submit_feedback(&mut h.session, 1, 0, Judgment::Positive)
        .await
        .unwrap();

    assert_eq!(first.feedback.len(), 1);
    assert!(second.is_empty());
    assert_eq!(h.feedback.records().unwrap().len(), 1);

    let key = FeedbackKey {
        conversation_id: first.conversation_id.clone(),
        message_index: 1,
        alternative_index: 0,
    };
    assert_eq!(h.session.feedback_status(&key), FeedbackStatus::Positive);

    // Positive is terminal
    let err = h
        .pipeline
        .on_submit_clarification(&mut h.session, 1, 0, CLARIFICATION)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Chat(_)));
    assert_eq!(h.session.active_messages().len(), 2);
}

#[tokio::test]
async fn second_clarification_is_rejected() {
    let mut h = harness(Reply::FirstPassage, RetryPolicy::Reuse).await;
    h.pipeline
        .on_submit_question(&mut h.session, QUESTION)
        .await
        .unwrap();
    h.pipeline
        .on_submit_feedback(&mut h.session, 1, 0, Judgment::Negative)
        .await
        .unwrap();
    h.pipeline
        .on_submit_clarification(&mut h.session, 1, 0, CLARIFICATION)
        .await
        .unwrap();

    let again = h
        .pipeline
        .on_submit_clarification(&mut h.session, 1, 0, "Och för vuxna?")
        .await;
    assert!(matches!(again, Err(AppError::Chat(_))));
    assert_eq!(h.feedback.records().unwrap().len(), 2);
    assert_eq!(h.session.active_messages().len(), 4);
}

#[tokio::test]
async fn feedback_only_for_assistant_messages_and_valid_alternatives() {
    let mut h = harness(Reply::FirstPassage, RetryPolicy::Reuse).await;
    h.pipeline
        .on_submit_question(&mut h.session, QUESTION)
        .await
        .unwrap();

    let on_user = h
        .pipeline
        .on_submit_feedback(&mut h.session, 0, 0, Judgment::Positive)
        .await;
    assert!(matches!(on_user, Err(AppError::Chat(_))));

    let bad_alternative = h
        .pipeline
        .on_submit_feedback(&mut h.session, 1, 3, Judgment::Positive)
        .await;
    assert!(matches!(bad_alternative, Err(AppError::Chat(_))));

    let bad_index = h
        .pipeline
        .on_submit_feedback(&mut h.session, 9, 0, Judgment::Positive)
        .await;
    assert!(matches!(bad_index, Err(AppError::Chat(_))));

    assert!(h.feedback.records().unwrap().is_empty());
}

#[tokio::test]
async fn alternatives_are_judged_independently() {
    let reply = "Använd Ny remiss.\n---ALTERNATIV---\nAnvänd journalmenyn.";
    let mut h = harness(Reply::Fixed(reply.to_string()), RetryPolicy::Reuse).await;
    h.pipeline
        .on_submit_question(&mut h.session, QUESTION)
        .await
        .unwrap();

    h.pipeline
        .on_submit_feedback(&mut h.session, 1, 0, Judgment::Positive)
        .await
        .unwrap();
    h.pipeline
        .on_submit_feedback(&mut h.session, 1, 1, Judgment::Negative)
        .await
        .unwrap();

    let records = h.feedback.records().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].answer.starts_with("Använd Ny remiss."));
    assert!(records[1].answer.starts_with("Använd journalmenyn."));
    assert!(records.iter().all(|r| r.answer.contains("KÄLLA:")));
    assert_eq!(records[0].sources, records[1].sources);
    assert!(!records[0].sources.is_empty());
}

#[tokio::test]
async fn backend_failure_is_recorded_as_answer() {
    let mut h = harness(
        Reply::Fail("connection refused".to_string()),
        RetryPolicy::Reuse,
    )
    .await;

    let delta = h
        .pipeline
        .on_submit_question(&mut h.session, QUESTION)
        .await
        .unwrap();

    let answer = delta.answer().unwrap();
    assert!(answer.content.starts_with(BACKEND_ERROR_PREFIX));
    assert!(answer.content.contains("connection refused"));
    assert_eq!(h.session.active_messages().len(), 2);

    // The failed answer can still be judged and retried
    h.pipeline
        .on_submit_feedback(&mut h.session, 1, 0, Judgment::Negative)
        .await
        .unwrap();
    let retry = h
        .pipeline
        .on_submit_clarification(&mut h.session, 1, 0, CLARIFICATION)
        .await
        .unwrap();
    assert_eq!(retry.messages.len(), 2);
}

#[tokio::test]
async fn empty_question_is_rejected() {
    let mut h = harness(Reply::FirstPassage, RetryPolicy::Reuse).await;
    let result = h.pipeline.on_submit_question(&mut h.session, "   ").await;
    assert!(matches!(result, Err(AppError::Chat(_))));
    assert!(h.session.active_messages().is_empty());
}
