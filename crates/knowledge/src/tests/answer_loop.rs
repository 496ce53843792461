//! End-to-end behaviour of the answer loop against a scripted model.

use super::{completer, rate_limited, reply, settings, text, ScriptedModel};
use crate::backend::InMemoryIndex;
use crate::rag::{answer_question, Termination, NO_EVIDENCE_MESSAGE};
use docask_llm::CompletionError;
use docask_prompt::{HistoryTurn, PromptSet};

fn policy_index() -> InMemoryIndex {
    InMemoryIndex::new(vec![
        text("Cover page.", "policy.pdf", 3),
        text("Refund policy: a refund is granted within 14 days.", "policy.pdf", 4),
        text("Exceptions apply to sale items.", "policy.pdf", 5),
    ])
}

#[tokio::test]
async fn test_no_candidates_skips_the_model() {
    let model = ScriptedModel::new(vec![reply("unused")]);
    let index = InMemoryIndex::new(vec![text("The library opens at nine.", "campus.pdf", 1)]);

    let response = answer_question(
        "parking permits",
        &[],
        &index,
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    assert_eq!(response.termination, Termination::NoEvidence);
    assert_eq!(response.answer, NO_EVIDENCE_MESSAGE);
    assert!(response.sources.is_empty());
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_complete_on_first_round() {
    let model = ScriptedModel::new(vec![reply(
        "Answer:\nTuition is 500 euros.\n\nSources:\n- fees p1\n\nStatus:\nComplete information",
    )]);
    let index = InMemoryIndex::new(vec![text(
        "Tuition fees are 500 euros per semester.",
        "fees.pdf",
        1,
    )]);

    let response = answer_question(
        "tuition fees",
        &[],
        &index,
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    assert!(response.is_complete());
    assert_eq!(response.iterations, 1);
    assert_eq!(
        response.answer,
        "Answer:\nTuition is 500 euros.\n\nSources:\n- fees p1"
    );
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].source, "fees.pdf");
    assert_eq!(response.sources[0].page, "1");

    let prompts = model.prompts();
    assert!(prompts[0].contains("[NEW TEXT fees.pdf p1]"));
    assert!(prompts[0].contains("QUESTION: tuition fees"));
}

#[tokio::test]
async fn test_partial_answer_expands_to_neighbour_pages() {
    let model = ScriptedModel::new(vec![
        reply("Answer:\nRefunds within 14 days.\n\nSources:\n- policy p4\n\nStatus:\nPartial information"),
        reply(
            "Answer:\nRefunds within 14 days, except sale items.\n\nSources:\n- policy p4\n- policy p5\n\nStatus:\nComplete information",
        ),
    ]);

    let response = answer_question(
        "refund policy",
        &[],
        &policy_index(),
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    assert!(response.is_complete());
    assert_eq!(response.iterations, 2);
    let pages: Vec<&str> = response.sources.iter().map(|s| s.page.as_str()).collect();
    assert_eq!(pages, vec!["4", "5"]);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("[NEW TEXT policy.pdf p4]"));
    assert!(!prompts[0].contains("policy.pdf p5"));
    assert!(prompts[1].contains("[USED TEXT policy.pdf p4]"));
    assert!(prompts[1].contains("[NEW TEXT policy.pdf p3]"));
    assert!(prompts[1].contains("[NEW TEXT policy.pdf p5]"));
}

#[tokio::test]
async fn test_partial_answer_without_neighbours_returns_last_answer() {
    let partial = "Answer:\nPermits cost 40 euros.\n\nSources:\n- guide p1\n\nStatus:\nPartial information";
    let model = ScriptedModel::new(vec![reply(partial)]);
    let index = InMemoryIndex::new(vec![text("Parking permits cost 40 euros.", "guide.pdf", 1)]);

    let response = answer_question(
        "parking permits",
        &[],
        &index,
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    assert_eq!(response.termination, Termination::Exhausted);
    assert_eq!(response.answer, partial);
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].source, "guide.pdf");
    assert_eq!(model.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_pool_stops_the_loop() {
    let model = ScriptedModel::new(vec![rate_limited(30)]);

    let response = answer_question(
        "refund policy",
        &[],
        &policy_index(),
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    assert_eq!(response.termination, Termination::RateLimited { wait_secs: 30 });
    assert!(response.answer.contains("Please wait 30 seconds"));
    assert!(response.sources.is_empty());
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_oversized_payload_is_retried_with_smaller_context() {
    let model = ScriptedModel::new(vec![
        Err(CompletionError::PayloadTooLarge),
        reply("Answer:\nWithin 14 days.\n\nSources:\n- policy p4\n\nStatus:\nComplete information"),
    ]);

    let response = answer_question(
        "refund policy",
        &[],
        &policy_index(),
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    assert!(response.is_complete());
    assert_eq!(response.iterations, 1);
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_oversized_payload_at_minimum_budget_skips_batch() {
    let model = ScriptedModel::new(vec![Err(CompletionError::PayloadTooLarge)]);
    let mut settings = settings();
    settings.max_context_tokens = 300;

    let response = answer_question(
        "refund policy",
        &[],
        &policy_index(),
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings,
    )
    .await
    .unwrap();

    assert_eq!(response.termination, Termination::Exhausted);
    assert_eq!(response.answer, NO_EVIDENCE_MESSAGE);
    assert_eq!(response.iterations, 0);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_oversized_expansion_round_keeps_neighbour_pages() {
    let model = ScriptedModel::new(vec![
        reply("Answer:\nRefunds within 14 days.\n\nSources:\n- policy p4\n\nStatus:\nPartial information"),
        Err(CompletionError::PayloadTooLarge),
        reply(
            "Answer:\nRefunds within 14 days, except sale items.\n\nSources:\n- policy p4\n- policy p5\n\nStatus:\nComplete information",
        ),
    ]);

    let response = answer_question(
        "refund policy",
        &[],
        &policy_index(),
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    assert!(response.is_complete());
    assert_eq!(response.iterations, 2);
    let pages: Vec<&str> = response.sources.iter().map(|s| s.page.as_str()).collect();
    assert_eq!(pages, vec!["4", "5"]);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 3);
    assert_eq!(prompts[1], prompts[2]);
    assert!(prompts[2].contains("[NEW TEXT policy.pdf p3]"));
    assert!(prompts[2].contains("[NEW TEXT policy.pdf p5]"));
}

#[tokio::test]
async fn test_transport_failure_without_answer() {
    let model = ScriptedModel::new(Vec::new());

    let response = answer_question(
        "refund policy",
        &[],
        &policy_index(),
        &completer(model),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    assert_eq!(response.termination, Termination::TransportFailure);
    assert!(response.answer.contains("unreachable"));
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn test_transport_failure_keeps_last_answer() {
    let partial = "Answer:\nOpen from nine.\n\nSources:\n- a p1\n\nStatus:\nPartial information";
    let model = ScriptedModel::new(vec![reply(partial)]);
    let index = InMemoryIndex::new(vec![
        text("Library hours: library hours start at nine.", "a.pdf", 1),
        text("Library hours vary.", "b.pdf", 1),
    ]);
    let mut settings = settings();
    settings.text_batch_size = 1;

    let response = answer_question(
        "library hours",
        &[],
        &index,
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings,
    )
    .await
    .unwrap();

    assert_eq!(response.termination, Termination::TransportFailure);
    assert_eq!(response.answer, partial);
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].source, "a.pdf");
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_history_is_summarized_into_prompt() {
    let model = ScriptedModel::new(vec![reply(
        "Answer:\nWithin 14 days.\n\nSources:\n- policy p4\n\nStatus:\nComplete information",
    )]);
    let prior = vec![
        HistoryTurn::user("What are the fees?"),
        HistoryTurn::assistant("500 euros."),
    ];

    answer_question(
        "refund policy",
        &prior,
        &policy_index(),
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings(),
    )
    .await
    .unwrap();

    let prompt = &model.prompts()[0];
    assert!(prompt.contains("=== Previous Conversation ==="));
    assert!(prompt.contains("Q1: What are the fees?"));
    assert!(prompt.contains("A1: 500 euros."));
}

#[tokio::test]
async fn test_round_limit_bounds_the_loop() {
    let insufficient = "Answer:\nNothing relevant.\n\nSources:\n- d1 p1\n\nStatus:\nNo information";
    let model = ScriptedModel::new(vec![reply(insufficient), reply(insufficient), reply(insufficient)]);
    let index = InMemoryIndex::new(
        (1..=4)
            .map(|n| text("Library hours.", &format!("d{}.pdf", n), 1))
            .collect(),
    );
    let mut settings = settings();
    settings.text_batch_size = 1;
    settings.max_iterations = 2;

    let response = answer_question(
        "library hours",
        &[],
        &index,
        &completer(model.clone()),
        &PromptSet::builtin(),
        &settings,
    )
    .await
    .unwrap();

    assert_eq!(response.termination, Termination::Exhausted);
    assert_eq!(response.iterations, 2);
    assert_eq!(response.answer, insufficient);
    assert!(response.sources.is_empty());
    assert_eq!(model.calls(), 2);
}
