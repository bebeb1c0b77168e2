use async_trait::async_trait;

use super::{GenerateError, Generator, Passage};

/// Deterministic extractive backend: quotes the retrieved passages under the
/// question. Needs no model and never fails.
pub struct TemplateGenerator;

#[async_trait]
impl Generator for TemplateGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, prompt: &str, context: &[Passage]) -> Result<String, GenerateError> {
        Ok(compose(prompt, context))
    }
}

pub(crate) fn compose(question: &str, context: &[Passage]) -> String {
    let mut out = format!("**Answer based on your documents**\n\nQuestion: {}\n", question.trim());
    if context.is_empty() {
        out.push_str("\nNo course material was retrieved for this question.");
        return out;
    }
    out.push_str("\nRelevant material:\n");
    for (i, p) in context.iter().enumerate() {
        out.push_str(&format!("\n[{}] {} ({})\n{}\n", i + 1, p.source, p.subject, p.text.trim()));
    }
    out.push_str("\nSee the cited documents for the full explanation.");
    out
}
