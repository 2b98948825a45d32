//! Completion-stream adapter.
//!
//! Drives the chat backend's delta stream, segments it into lines for the
//! [`ReasoningClassifier`], and upholds the terminal guarantees: a
//! `final_answer` is always emitted (synthesized if the model never produced
//! a `FINAL:` line) and exactly one `complete` ends every successful run.
//! All fatal failures propagate to the caller, which owns `error` emission;
//! that keeps terminal events exactly-once by construction.

use futures::StreamExt;

use taliesin_llm::{ChatBackend, ChatMessage, CompletionRequest};
use taliesin_types::{Event, RunId};

use crate::classifier::{ClassifiedLine, ReasoningClassifier};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::registry::RunRegistry;

/// Fallback answer when the model never produced a `FINAL:` line.
const FALLBACK_FINAL_ANSWER: &str = "I have completed my research and analysis. \
     Please refer to my thoughts above for the comprehensive findings.";

/// Stream a completion for a run, classifying lines into events.
///
/// Stream-creation failure and mid-stream transport failure both return
/// `Err` without emitting anything terminal; the caller converts that into
/// the run's single `error` event.
pub async fn stream_completion(
    backend: &dyn ChatBackend,
    registry: &RunRegistry,
    run_id: RunId,
    messages: Vec<ChatMessage>,
    model: &str,
    config: &AgentConfig,
) -> Result<()> {
    tracing::info!(%run_id, model, "Opening completion stream");

    let request = CompletionRequest::new(model, messages, config.max_completion_tokens)
        .with_streaming();
    let mut stream = backend.complete_stream(request).await?;

    // Narrate that analysis is starting before the first delta lands.
    registry.emit(run_id, Event::thought("Analyzing information and context..."));
    registry.emit(
        run_id,
        Event::thought("Processing information and generating comprehensive response..."),
    );

    let mut classifier = ReasoningClassifier::new();
    let mut current_line = String::new();
    let mut classified_lines = 0usize;

    while let Some(delta) = stream.next().await {
        let delta = delta?;
        current_line.push_str(&delta);

        while let Some(newline) = current_line.find('\n') {
            let rest = current_line.split_off(newline + 1);
            let line = std::mem::replace(&mut current_line, rest);
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if classified_lines < config.max_thoughts {
                classified_lines += 1;
                dispatch(registry, run_id, classifier.classify(line));
            } else {
                // Past the cap: keep draining the stream, classify nothing.
                tracing::debug!(%run_id, "Classified-line cap reached, draining");
            }
        }
    }

    // The last line often arrives without a trailing newline; it may even
    // hold several tagged statements. Split the tail on markers and classify
    // each segment exactly once.
    for segment in split_on_markers(&current_line) {
        dispatch(registry, run_id, classifier.classify(&segment));
    }

    if !classifier.final_answer_sent() {
        tracing::warn!(%run_id, "No final answer produced, sending fallback");
        registry.emit(run_id, Event::final_answer(FALLBACK_FINAL_ANSWER));
    }

    registry.emit(run_id, Event::complete("Answer complete"));
    tracing::info!(%run_id, classified_lines, "Completion stream finished");
    Ok(())
}

fn dispatch(registry: &RunRegistry, run_id: RunId, classified: ClassifiedLine) {
    match classified {
        ClassifiedLine::Thought(text) => registry.emit(run_id, Event::thought(text)),
        ClassifiedLine::FinalAnswer(text) => registry.emit(run_id, Event::final_answer(text)),
        ClassifiedLine::Ignored => {}
    }
}

/// Split text into segments each starting at a `THOUGHT:`/`FINAL:` marker.
///
/// Text before the first marker is dropped, matching how untagged lines are
/// treated everywhere else.
fn split_on_markers(text: &str) -> Vec<String> {
    let upper = text.to_ascii_uppercase();
    let mut starts: Vec<usize> = Vec::new();
    for marker in ["THOUGHT:", "FINAL:"] {
        starts.extend(upper.match_indices(marker).map(|(i, _)| i));
    }
    starts.sort_unstable();

    let mut segments = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let segment = text[start..end].trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
    }
    segments
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use taliesin_llm::MockChatBackend;
    use taliesin_types::Envelope;

    async fn run_adapter(backend: MockChatBackend) -> (Vec<Envelope>, Result<()>) {
        run_adapter_with_config(backend, AgentConfig::default()).await
    }

    async fn run_adapter_with_config(
        backend: MockChatBackend,
        config: AgentConfig,
    ) -> (Vec<Envelope>, Result<()>) {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry.register(run_id);

        let result = stream_completion(
            &backend,
            &registry,
            run_id,
            vec![ChatMessage::user("question")],
            "mock-model",
            &config,
        )
        .await;

        // Close out the channel for collection; on error no terminal event
        // exists, so emit one as the orchestrator would.
        if result.is_err() {
            registry.emit(run_id, Event::error("test terminal"));
        }
        let events: Vec<Envelope> = registry.consume(run_id).unwrap().collect().await;
        (events, result)
    }

    fn types_of(events: &[Envelope]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match &e.event {
                Event::Thought { .. } => "thought",
                Event::FinalAnswer { .. } => "final_answer",
                Event::Complete { .. } => "complete",
                Event::Error { .. } => "error",
                _ => "other",
            })
            .collect()
    }

    #[tokio::test]
    async fn test_two_plus_two_scenario() {
        let backend =
            MockChatBackend::with_deltas(vec!["THOUGHT: adding numbers\n", "FINAL: 4\n"]);
        let (events, result) = run_adapter(backend).await;
        result.unwrap();

        // Filter priming thoughts by text; the tagged ones are what matter.
        let classified: Vec<&Envelope> = events
            .iter()
            .filter(|e| {
                !matches!(&e.event, Event::Thought { text } if text.contains("..."))
            })
            .collect();

        assert_eq!(classified[0].event, Event::thought("adding numbers"));
        assert_eq!(classified[1].event, Event::final_answer("4"));
        assert_eq!(classified[2].event, Event::complete("Answer complete"));
        assert_eq!(classified.len(), 3);
    }

    #[tokio::test]
    async fn test_deltas_split_mid_line() {
        let backend = MockChatBackend::with_deltas(vec![
            "THOU", "GHT: sp", "lit across", " deltas\nFIN", "AL: whole\n",
        ]);
        let (events, result) = run_adapter(backend).await;
        result.unwrap();

        assert!(events
            .iter()
            .any(|e| e.event == Event::thought("split across deltas")));
        assert!(events.iter().any(|e| e.event == Event::final_answer("whole")));
    }

    #[tokio::test]
    async fn test_tail_without_newline_is_recovered() {
        let backend = MockChatBackend::with_deltas(vec!["THOUGHT: reasoning\n", "FINAL: 42"]);
        let (events, result) = run_adapter(backend).await;
        result.unwrap();

        assert!(events.iter().any(|e| e.event == Event::final_answer("42")));
        // The synthesized fallback must not also fire.
        let final_answers = events
            .iter()
            .filter(|e| matches!(e.event, Event::FinalAnswer { .. }))
            .count();
        assert_eq!(final_answers, 1);
    }

    #[tokio::test]
    async fn test_fallback_final_answer_when_none_produced() {
        let backend = MockChatBackend::with_deltas(vec!["THOUGHT: only thinking\n"]);
        let (events, result) = run_adapter(backend).await;
        result.unwrap();

        let answers: Vec<&Envelope> = events
            .iter()
            .filter(|e| matches!(e.event, Event::FinalAnswer { .. }))
            .collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].event, Event::final_answer(FALLBACK_FINAL_ANSWER));

        // The fallback precedes complete.
        assert_eq!(*types_of(&events).last().unwrap(), "complete");
    }

    #[tokio::test]
    async fn test_exactly_one_complete() {
        let backend = MockChatBackend::with_deltas(vec!["FINAL: short\n"]);
        let (events, result) = run_adapter(backend).await;
        result.unwrap();

        let completes = events
            .iter()
            .filter(|e| matches!(e.event, Event::Complete { .. }))
            .count();
        assert_eq!(completes, 1);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_untagged_lines_never_emitted() {
        let backend = MockChatBackend::with_deltas(vec![
            "random preamble\n",
            "THOUGHT: tagged\n",
            "more untagged tokens\n",
            "FINAL: done\n",
        ]);
        let (events, result) = run_adapter(backend).await;
        result.unwrap();

        for event in &events {
            if let Event::Thought { text } = &event.event {
                assert!(
                    text == "tagged" || text.contains("..."),
                    "unexpected thought: {}",
                    text
                );
            }
        }
    }

    #[tokio::test]
    async fn test_stream_creation_failure_is_fatal() {
        let (events, result) = run_adapter(MockChatBackend::failing()).await;
        assert!(result.is_err());

        // The adapter emitted nothing terminal itself.
        let completes = events
            .iter()
            .filter(|e| matches!(e.event, Event::Complete { .. }))
            .count();
        assert_eq!(completes, 0);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_fatal() {
        let (events, result) = run_adapter(MockChatBackend::failing_after(2)).await;
        assert!(result.is_err());
        assert!(
            !events
                .iter()
                .any(|e| matches!(e.event, Event::Complete { .. }))
        );
    }

    #[tokio::test]
    async fn test_max_thoughts_caps_classification() {
        let deltas: Vec<String> = (0..10).map(|i| format!("THOUGHT: number {}\n", i)).collect();
        let backend = MockChatBackend::with_deltas(deltas);
        let config = AgentConfig::default().with_max_thoughts(3);
        let (events, result) = run_adapter_with_config(backend, config).await;
        result.unwrap();

        let tagged_thoughts = events
            .iter()
            .filter(
                |e| matches!(&e.event, Event::Thought { text } if text.starts_with("number")),
            )
            .count();
        assert_eq!(tagged_thoughts, 3);

        // Run still completes normally after draining.
        assert!(events.last().unwrap().is_terminal());
    }

    #[test]
    fn test_split_on_markers_multiple_statements() {
        let segments = split_on_markers("THOUGHT: first FINAL: second");
        assert_eq!(segments, vec!["THOUGHT: first", "FINAL: second"]);
    }

    #[test]
    fn test_split_on_markers_drops_leading_text() {
        let segments = split_on_markers("noise before THOUGHT: real");
        assert_eq!(segments, vec!["THOUGHT: real"]);
    }

    #[test]
    fn test_split_on_markers_case_insensitive() {
        let segments = split_on_markers("final: lower");
        assert_eq!(segments, vec!["final: lower"]);
    }

    #[test]
    fn test_split_on_markers_empty_tail() {
        assert!(split_on_markers("").is_empty());
        assert!(split_on_markers("no markers here").is_empty());
    }
}
