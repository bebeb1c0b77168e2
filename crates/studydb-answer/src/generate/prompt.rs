use super::Passage;

pub const SYSTEM_INSTRUCTIONS: &str = "You are an experienced, patient teacher. A student asks a question and you have \
access to excerpts from their course documents. Answer clearly and pedagogically, rely on the documents provided, \
give concrete examples when possible, structure the answer with headings if useful, stay precise and factual, and \
pitch the explanation at university level. If the documents do not contain the answer, say so.";

/// Context block: each passage tagged with its source, separated by blank lines.
pub fn render_context(context: &[Passage]) -> String {
    context
        .iter()
        .map(|p| format!("[Source: {} | {}]\n{}", p.source, p.subject, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Single-string prompt for completion-style backends.
pub fn educational_prompt(question: &str, context: &[Passage]) -> String {
    format!(
        "{SYSTEM_INSTRUCTIONS}\n\nCOURSE DOCUMENTS:\n{}\n\nSTUDENT QUESTION:\n{}\n\nANSWER:",
        render_context(context),
        question.trim()
    )
}

/// User message for chat-style backends; instructions go in the system message.
pub fn user_message(question: &str, context: &[Passage]) -> String {
    format!("COURSE DOCUMENTS:\n{}\n\nSTUDENT QUESTION:\n{}", render_context(context), question.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_tags_each_passage() {
        let ctx = vec![
            Passage { source: "a.txt".into(), subject: "Electricity".into(), text: "U = R × I".into() },
            Passage { source: "b.md".into(), subject: "Electricity".into(), text: "P = U × I".into() },
        ];
        let p = educational_prompt("What is Ohm's law?", &ctx);
        assert!(p.contains("[Source: a.txt | Electricity]\nU = R × I\n\n[Source: b.md"));
        assert!(p.ends_with("What is Ohm's law?\n\nANSWER:"));
    }
}
