//! End-to-end conversation flow against scripted AI sessions.

use std::sync::Arc;
use std::time::Duration;

use case_dialogue::adapters::ai::{MockError, MockSessionFactory};
use case_dialogue::application::{
    wait_until, ConversationController, ConversationSetup, Notice, STAND_BY_MESSAGE,
};
use case_dialogue::domain::case::{ArgumentFramework, CaseData, Protagonist};
use case_dialogue::domain::conversation::{ChatOptions, ConversationPhase, Role, HINT_REFUSAL};
use case_dialogue::domain::persona::PersonaId;

fn case() -> CaseData {
    CaseData {
        case_id: "northwind-expansion".to_string(),
        title: "Northwind Coffee Expansion".to_string(),
        protagonist: Protagonist::new("Dana Whitfield", "Founder of Northwind Coffee"),
        chat_question: "Should we open a second roastery in Denver?".to_string(),
        case_text: "Northwind roasts 40 tonnes a year in Portland. Denver demand grew 30%."
            .to_string(),
        teaching_note: "Capacity is the binding constraint; shipping costs are secondary."
            .to_string(),
        supplementary_materials: None,
        argument_framework: Some(ArgumentFramework {
            arguments_for: vec!["Demand growth".to_string()],
            arguments_against: vec!["Capital outlay".to_string()],
        }),
    }
}

fn evaluation_reply(hint_count: u32) -> String {
    serde_json::json!({
        "criteria": [
            {"criterion": "Position", "score": 4, "feedback": "Clear stance."},
            {"criterion": "Use of case facts", "score": 4, "feedback": "Cited growth."},
            {"criterion": "Handling counter-arguments", "score": 3, "feedback": "Partial."},
            {"criterion": "Implementation", "score": 3, "feedback": "Some next steps."}
        ],
        "totalScore": 14,
        "summary": "A reasoned case for expansion.",
        "hintCount": hint_count
    })
    .to_string()
}

fn controller(factory: &MockSessionFactory, options: ChatOptions) -> ConversationController {
    let setup = ConversationSetup::new(case(), options, "Riley Park", "claude-3-5-sonnet")
        .with_evaluation_model("gpt-4o")
        .with_persona(PersonaId::Strict)
        .with_retry_delay(Duration::from_secs(25));
    ConversationController::new(setup, Arc::new(factory.clone()))
}

#[tokio::test]
async fn full_conversation_reaches_evaluation_with_hint_penalty() {
    let factory = MockSessionFactory::new()
        .with_reply("What makes you confident demand will hold?")
        .with_reply("Consider the Portland capacity numbers.")
        .with_reply("Look at shipping versus capacity.");
    let options = ChatOptions {
        hints_allowed: 2,
        free_hints: 1,
        ..ChatOptions::default()
    };
    let mut c = controller(&factory, options);

    c.start().unwrap();
    c.submit("We should open Denver, demand grew 30%").await.unwrap();
    c.submit("Can I have a hint?").await.unwrap();
    c.submit("One more hint please").await.unwrap();
    let refused = c.submit("A final hint?").await.unwrap();
    assert_eq!(refused.notices, vec![Notice::HintRefused]);
    assert_eq!(refused.appended[1].content, HINT_REFUSAL);
    assert_eq!(factory.call_count(), 3);

    assert_eq!(
        c.submit("ok, time is up").await.unwrap().phase,
        ConversationPhase::AwaitingHelpfulPermission
    );
    c.submit("no thanks").await.unwrap();
    assert_eq!(c.phase(), ConversationPhase::AwaitingTranscriptPermission);
    c.submit("yes").await.unwrap();
    assert_eq!(c.phase(), ConversationPhase::FeedbackComplete);
    assert!(c.transcript_consent());

    factory.push_reply(evaluation_reply(3));
    let result = c.proceed_to_evaluation().await.unwrap();

    // Three hint requests with one free: raw 14 minus 2.
    assert_eq!(result.hint_count, 3);
    assert_eq!(result.total_score, 12);
    assert_eq!(c.phase(), ConversationPhase::Evaluating);

    let opened = factory.opened();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].model_id, "claude-3-5-sonnet");
    assert_eq!(opened[1].model_id, "gpt-4o");
    assert!(opened[1].system_prompt.dynamic.contains("Riley Park: A final hint?"));
    assert!(!opened[0].system_prompt.dynamic.contains("Capacity is the binding constraint"));
    assert!(opened[0].system_prompt.cacheable.contains("Capacity is the binding constraint"));
}

#[tokio::test]
async fn transcript_only_grows_during_chat() {
    let factory = MockSessionFactory::new();
    let mut c = controller(&factory, ChatOptions::default());
    c.start().unwrap();

    let mut seen = c.transcript().messages().to_vec();
    for input in ["Open Denver", "I need help", "hint", "What about a clue?"] {
        c.submit(input).await.unwrap();
        let now = c.transcript().messages();
        assert!(now.len() > seen.len());
        assert_eq!(&now[..seen.len()], &seen[..]);
        seen = now.to_vec();
    }
    assert_eq!(c.hints_used(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_send_retries_once_after_the_delay() {
    let factory = MockSessionFactory::new()
        .with_error(MockError::RateLimited { retry_after_secs: 30 })
        .with_reply("Why Denver and not Seattle?");
    let mut c = controller(&factory, ChatOptions::default());
    c.start().unwrap();

    let outcome = c.submit("We should open Denver").await.unwrap();
    assert_eq!(outcome.appended.last().unwrap().content, STAND_BY_MESSAGE);
    assert!(outcome.notices.contains(&Notice::Alert));

    let before = tokio::time::Instant::now();
    wait_until(c.retry_deadline()).await;
    assert!(before.elapsed() >= Duration::from_secs(25));

    let retried = c.fire_retry().await.unwrap();
    assert_eq!(retried.notices, vec![Notice::ClearError]);

    let calls = factory.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].text, calls[1].text);

    let last = c.transcript().last().unwrap();
    assert_eq!(last.role, Role::Model);
    assert!(last.content.ends_with("Why Denver and not Seattle?"));
    assert!(c
        .transcript()
        .messages()
        .iter()
        .all(|m| m.content != STAND_BY_MESSAGE));
}

#[tokio::test]
async fn feedback_questions_can_be_skipped_entirely() {
    let factory = MockSessionFactory::new();
    let options = ChatOptions {
        ask_for_feedback: false,
        ask_save_transcript: false,
        ..ChatOptions::default()
    };
    let mut c = controller(&factory, options);
    c.start().unwrap();

    let outcome = c.submit("ok time is up").await.unwrap();

    assert_eq!(outcome.phase, ConversationPhase::FeedbackComplete);
    assert!(!c.transcript_consent());
    assert_eq!(factory.call_count(), 0);
}
