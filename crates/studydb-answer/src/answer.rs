use serde::{Deserialize, Serialize};

/// Where a cited source comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceOrigin {
    Document { document_id: String, chunk_index: usize, offset: usize },
    Fallback { entry_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub excerpt: String,
    pub subject: String,
    pub score: f32,
    pub origin: SourceOrigin,
}

/// How an answer was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKind {
    /// Generated from retrieved passages.
    Generated,
    /// The generative backend failed; a best-effort answer was substituted.
    Degraded { reason: String },
    /// Verbatim curated answer.
    Fallback,
    /// Neither the corpus nor the knowledge base covers the question.
    Insufficient,
    /// The engine itself failed; nothing could be answered.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub confidence: f32,
    pub sources: Vec<Source>,
    pub processing_time_ms: u64,
    pub kind: AnswerKind,
}

impl Answer {
    pub fn insufficient(question: &str, subject: Option<&str>) -> Self {
        let scope = subject.map(|s| format!(" in subject '{s}'")).unwrap_or_default();
        Self {
            answer: format!(
                "Insufficient information: none of the indexed documents{scope} or curated answers cover \"{}\". \
                 Try rephrasing the question or adding course material that covers it.",
                question.trim()
            ),
            confidence: 0.0,
            sources: Vec::new(),
            processing_time_ms: 0,
            kind: AnswerKind::Insufficient,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            answer: format!("The assistant could not process this question right now ({reason}). Please try again later."),
            confidence: 0.0,
            sources: Vec::new(),
            processing_time_ms: 0,
            kind: AnswerKind::Failed { reason },
        }
    }

    pub fn used_fallback(&self) -> bool {
        self.sources.iter().any(|s| matches!(s.origin, SourceOrigin::Fallback { .. }))
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("U = R × I", 100), "U = R × I");
        assert_eq!(excerpt("U = R × I", 7), "U = R ×...");
        assert_eq!(excerpt("ééééé", 2), "éé...");
    }

    #[test]
    fn insufficient_has_no_sources() {
        let a = Answer::insufficient("Why?", Some("History"));
        assert_eq!(a.confidence, 0.0);
        assert!(a.sources.is_empty());
        assert!(a.answer.contains("History"));
    }
}
