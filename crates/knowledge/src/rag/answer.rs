//! Iterative answering loop.
//!
//! Retrieves candidates once, then runs rounds of batch selection, context
//! assembly, completion and classification until the model reports complete
//! information or the candidates run out.

use crate::backend::SearchBackend;
use crate::config::RetrievalConfig;
use crate::rag::classify::{classify, extract_cited_chunks, strip_status, AnswerStatus};
use crate::rag::context::assemble_context;
use crate::rag::planner::BatchPlanner;
use crate::rag::retrieval::retrieve_candidates;
use crate::rag::state::RoundState;
use crate::rag::types::{RagResponse, Termination, NO_EVIDENCE_MESSAGE};
use docask_core::AppResult;
use docask_llm::{CompletionOutcome, ResilientCompleter};
use docask_prompt::{build_answer_prompt, compress_history, HistoryTurn, PromptSet};

/// An oversized batch is skipped once halving would drop the budget below this.
const MIN_CONTEXT_BUDGET: usize = 256;

/// Answer `query` from the documents behind `backend`.
///
/// `prior` is the earlier conversation; the last few question/answer pairs
/// are summarized into the prompt. Errors are returned only for local
/// failures such as an unrenderable prompt template; search and completion
/// failures end the loop with a user-facing message instead.
pub async fn answer_question(
    query: &str,
    prior: &[HistoryTurn],
    backend: &dyn SearchBackend,
    completer: &ResilientCompleter,
    prompts: &PromptSet,
    settings: &RetrievalConfig,
) -> AppResult<RagResponse> {
    tracing::info!("Answering question: {}", query);

    let pools = retrieve_candidates(backend, query, settings).await;
    if pools.is_empty() {
        tracing::info!("No candidates found, nothing to answer from");
        return Ok(RagResponse::no_evidence());
    }

    let summary = compress_history(prior, settings.history_pairs);
    let planner = BatchPlanner::new(&pools.text, &pools.tables, settings);
    let mut state = RoundState::new(settings.max_context_tokens);
    let mut rounds = 0usize;

    while state.iteration <= settings.max_iterations {
        let batch = planner.next_batch(&mut state, backend).await;
        if batch.is_empty() {
            tracing::info!("Candidates exhausted after {} rounds", rounds);
            break;
        }

        // An oversized payload retries the same batch with half the budget.
        let (context, completion) = loop {
            let context = assemble_context(
                &state.cited,
                &batch.text,
                &batch.tables,
                state.context_budget,
                settings.max_recalled_sources,
            );

            tracing::debug!(
                "Round {}: {} new chunks ({}), {} in context, budget {}",
                state.iteration,
                batch.len(),
                if batch.is_expanding { "expanding" } else { "advancing" },
                context.chunks.len(),
                state.context_budget
            );

            let prompt = build_answer_prompt(prompts, query, &summary, &context.text)?;
            let completion = completer.complete(&prompt.system, &prompt.user).await;

            let halved = state.context_budget / 2;
            if completion.outcome != CompletionOutcome::OversizedPayload
                || halved < MIN_CONTEXT_BUDGET
            {
                break (context, completion);
            }

            state.context_budget = halved;
            tracing::info!(
                "Payload too large, retrying round {} with budget {}",
                state.iteration,
                state.context_budget
            );
        };

        match completion.outcome {
            CompletionOutcome::Ok => {}
            CompletionOutcome::AllRateLimited { wait_secs } => {
                tracing::warn!("Stopping: all credentials rate limited for {}s", wait_secs);
                return Ok(RagResponse::new(
                    completion.text,
                    &[],
                    Termination::RateLimited { wait_secs },
                    rounds,
                ));
            }
            CompletionOutcome::OversizedPayload => {
                tracing::warn!(
                    "Round {} still too large at minimum budget, skipping its batch",
                    state.iteration
                );
                state.mark_used(batch.chunks());
                if !batch.is_expanding {
                    state.advance(settings.text_batch_size, settings.table_batch_size);
                }
                state.context_budget = settings.max_context_tokens;
                state.iteration += 1;
                continue;
            }
            CompletionOutcome::TransportError => {
                tracing::error!("Stopping: completion service failed: {}", completion.text);
                return Ok(if state.last_answer.is_empty() {
                    RagResponse::new(
                        completion.text,
                        &[],
                        Termination::TransportFailure,
                        rounds,
                    )
                } else {
                    RagResponse::new(
                        state.last_answer.clone(),
                        &state.cited,
                        Termination::TransportFailure,
                        rounds,
                    )
                });
            }
        }

        rounds += 1;
        let answer = completion.text;
        state.mark_used(&context.chunks);

        let status = classify(&answer);
        let cited = if status == AnswerStatus::Insufficient {
            Vec::new()
        } else {
            extract_cited_chunks(&answer, &context.chunks)
        };
        let added = state.record_citations(cited);

        tracing::info!(
            "Round {}: {} answer, {} new citations ({} total)",
            state.iteration,
            status.as_str(),
            added,
            state.cited.len()
        );

        if status == AnswerStatus::Complete {
            return Ok(RagResponse::new(
                strip_status(&answer),
                &state.cited,
                Termination::Complete,
                rounds,
            ));
        }

        state.last_answer = answer;
        if !batch.is_expanding {
            state.advance(settings.text_batch_size, settings.table_batch_size);
        }
        state.iteration += 1;
        state.context_budget = settings.max_context_tokens;
    }

    if state.iteration > settings.max_iterations {
        tracing::warn!("Stopped at the {} round limit", settings.max_iterations);
    }

    let answer = if state.last_answer.is_empty() {
        NO_EVIDENCE_MESSAGE.to_string()
    } else {
        state.last_answer.clone()
    };

    Ok(RagResponse::new(
        answer,
        &state.cited,
        Termination::Exhausted,
        rounds,
    ))
}
