//! Reasoning-line classifier.
//!
//! The model is instructed to prefix every line with `THOUGHT:` or `FINAL:`.
//! This state machine consumes one trimmed line at a time and decides what,
//! if anything, to surface. Untagged lines are dropped entirely so raw token
//! fragments never pollute the thought stream.

/// What a classified line should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedLine {
    /// Emit a thought with this text.
    Thought(String),
    /// Emit a final answer with this text.
    FinalAnswer(String),
    /// Emit nothing.
    Ignored,
}

/// Per-run line classifier.
///
/// Holds the run's `final_mode` and `final_answer_sent` state explicitly;
/// there is no terminal state, the classifier lives for the run's duration.
#[derive(Debug, Default)]
pub struct ReasoningClassifier {
    final_mode: bool,
    final_answer_sent: bool,
}

const THOUGHT_PREFIX: &str = "THOUGHT:";
const FINAL_PREFIX: &str = "FINAL:";

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

impl ReasoningClassifier {
    /// Create a fresh classifier in normal mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the run has entered final-answer mode.
    pub fn final_mode(&self) -> bool {
        self.final_mode
    }

    /// Whether a final answer has been emitted for this run.
    pub fn final_answer_sent(&self) -> bool {
        self.final_answer_sent
    }

    /// Classify one line of model output.
    pub fn classify(&mut self, line: &str) -> ClassifiedLine {
        let line = line.trim();
        if line.is_empty() {
            return ClassifiedLine::Ignored;
        }

        if let Some(rest) = strip_prefix_ci(line, THOUGHT_PREFIX) {
            let thought = rest.trim();
            if thought.is_empty() {
                return ClassifiedLine::Ignored;
            }
            return ClassifiedLine::Thought(thought.to_string());
        }

        if let Some(rest) = strip_prefix_ci(line, FINAL_PREFIX) {
            self.final_mode = true;
            let answer = rest.trim();
            if answer.is_empty() {
                // Bare "FINAL:" switches mode without emitting.
                return ClassifiedLine::Ignored;
            }
            self.final_answer_sent = true;
            return ClassifiedLine::FinalAnswer(answer.to_string());
        }

        tracing::trace!(line, "Dropping untagged line");
        ClassifiedLine::Ignored
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thought_line() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(
            classifier.classify("THOUGHT: adding numbers"),
            ClassifiedLine::Thought("adding numbers".to_string())
        );
        assert!(!classifier.final_mode());
        assert!(!classifier.final_answer_sent());
    }

    #[test]
    fn test_final_line_sets_flags() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(
            classifier.classify("FINAL: 4"),
            ClassifiedLine::FinalAnswer("4".to_string())
        );
        assert!(classifier.final_mode());
        assert!(classifier.final_answer_sent());
    }

    #[test]
    fn test_prefixes_are_case_insensitive() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(
            classifier.classify("thought: lower case"),
            ClassifiedLine::Thought("lower case".to_string())
        );
        assert_eq!(
            classifier.classify("Final: Mixed Case"),
            ClassifiedLine::FinalAnswer("Mixed Case".to_string())
        );
    }

    #[test]
    fn test_empty_line_ignored() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(classifier.classify(""), ClassifiedLine::Ignored);
        assert_eq!(classifier.classify("   "), ClassifiedLine::Ignored);
        assert!(!classifier.final_mode());
    }

    #[test]
    fn test_bare_thought_prefix_ignored() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(classifier.classify("THOUGHT:"), ClassifiedLine::Ignored);
        assert_eq!(classifier.classify("THOUGHT:   "), ClassifiedLine::Ignored);
        assert!(!classifier.final_mode());
        assert!(!classifier.final_answer_sent());
    }

    #[test]
    fn test_bare_final_prefix_switches_mode_without_emitting() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(classifier.classify("FINAL:"), ClassifiedLine::Ignored);
        assert!(classifier.final_mode());
        assert!(!classifier.final_answer_sent());
    }

    #[test]
    fn test_untagged_lines_dropped() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(classifier.classify("just some tokens"), ClassifiedLine::Ignored);
        assert_eq!(classifier.classify("THOUGHTS: near miss"), ClassifiedLine::Ignored);
        assert!(!classifier.final_mode());
    }

    #[test]
    fn test_whitespace_trimmed_from_content() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(
            classifier.classify("  THOUGHT:   padded   "),
            ClassifiedLine::Thought("padded".to_string())
        );
    }

    #[test]
    fn test_final_mode_persists() {
        let mut classifier = ReasoningClassifier::new();
        classifier.classify("FINAL: part one");
        // Later thoughts do not reset final mode.
        classifier.classify("THOUGHT: stray");
        assert!(classifier.final_mode());
    }

    #[test]
    fn test_non_ascii_line_does_not_panic() {
        let mut classifier = ReasoningClassifier::new();
        assert_eq!(classifier.classify("héllo wörld"), ClassifiedLine::Ignored);
        assert_eq!(classifier.classify("…"), ClassifiedLine::Ignored);
    }
}
