//! Per-format text extraction.

use scraper::{Html, Selector};
use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::DocumentFormat;

/// Text pulled out of a source file plus whatever metadata the format carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub title: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(alias = "matiere", alias = "matière")]
    subject: Option<String>,
    title: Option<String>,
}

pub fn extract(path: &Path, format: DocumentFormat, bytes: &[u8]) -> Result<Extracted> {
    match format {
        DocumentFormat::PlainText => Ok(Extracted { text: normalize(&decode(bytes)), ..Default::default() }),
        DocumentFormat::Markdown => Ok(markdown(&normalize(&decode(bytes)))),
        DocumentFormat::Html => Ok(html(&decode(bytes))),
        DocumentFormat::Pdf => pdf(path, bytes),
    }
}

/// Strip a UTF-8 BOM, turn CRLF/CR into LF and drop NUL bytes.
pub fn normalize(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.replace("\r\n", "\n").replace('\r', "\n").replace('\0', "")
}

fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).to_string(),
    }
}

fn markdown(text: &str) -> Extracted {
    let Some(rest) = text.strip_prefix("---\n") else {
        return Extracted { text: text.to_string(), ..Default::default() };
    };
    let (yaml, body) = match rest.find("\n---") {
        Some(pos) => {
            let after = &rest[pos + 4..];
            match after.find('\n') {
                Some(nl) if after[..nl].trim().is_empty() => (&rest[..pos], &after[nl + 1..]),
                None if after.trim().is_empty() => (&rest[..pos], ""),
                _ => return Extracted { text: text.to_string(), ..Default::default() },
            }
        }
        None => return Extracted { text: text.to_string(), ..Default::default() },
    };
    match serde_yaml::from_str::<FrontMatter>(yaml) {
        Ok(fm) => Extracted {
            text: body.to_string(),
            title: non_empty(fm.title),
            subject: non_empty(fm.subject),
        },
        Err(e) => {
            tracing::debug!("ignoring unparsable front matter: {e}");
            Extracted { text: text.to_string(), ..Default::default() }
        }
    }
}

fn html(source: &str) -> Extracted {
    let doc = Html::parse_document(source);
    let title = select_first(&doc, "title").map(|t| t.text().collect::<String>());
    let subject = select_first(&doc, r#"meta[name="subject"]"#)
        .and_then(|m| m.value().attr("content").map(str::to_string));

    let root = select_first(&doc, "body").unwrap_or_else(|| doc.root_element());
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
        });
        let piece = text.trim();
        if !hidden && !piece.is_empty() {
            parts.push(piece.to_string());
        }
    }
    Extracted {
        text: normalize(&parts.join("\n")),
        title: non_empty(title.map(|t| t.trim().to_string())),
        subject: non_empty(subject),
    }
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<scraper::ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next()
}

fn pdf(path: &Path, bytes: &[u8]) -> Result<Extracted> {
    // pdf-extract panics on some malformed files instead of returning an error.
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));
    let text = match outcome {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => return Err(format_error(path, format!("PDF text extraction failed: {e}"))),
        Err(_) => return Err(format_error(path, "PDF parser aborted on malformed input")),
    };
    let text = normalize(&text);
    if text.trim().is_empty() {
        return Err(format_error(path, "PDF has no text layer"));
    }
    Ok(Extracted { text, ..Default::default() })
}

fn format_error(path: &Path, reason: impl Into<String>) -> Error {
    Error::IngestFormat { path: path.to_path_buf(), reason: reason.into() }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_front_matter_sets_subject_and_title() {
        let src = "---\nsubject: Electricity\ntitle: Ohm\n---\n# Ohm's law\nU = R × I\n";
        let out = extract(Path::new("a.md"), DocumentFormat::Markdown, src.as_bytes()).unwrap();
        assert_eq!(out.subject.as_deref(), Some("Electricity"));
        assert_eq!(out.title.as_deref(), Some("Ohm"));
        assert_eq!(out.text, "# Ohm's law\nU = R × I\n");
    }

    #[test]
    fn markdown_without_closing_fence_keeps_everything() {
        let src = "---\nnot front matter\n";
        let out = extract(Path::new("a.md"), DocumentFormat::Markdown, src.as_bytes()).unwrap();
        assert_eq!(out.text, src);
        assert!(out.subject.is_none());
    }

    #[test]
    fn html_skips_scripts_and_reads_meta_subject() {
        let src = r#"<html><head><title>Power</title><meta name="subject" content="Electricity">
            <style>p { color: red }</style></head>
            <body><h1>Electrical power</h1><script>var x = 1;</script><p>P = U × I</p></body></html>"#;
        let out = extract(Path::new("a.html"), DocumentFormat::Html, src.as_bytes()).unwrap();
        assert_eq!(out.title.as_deref(), Some("Power"));
        assert_eq!(out.subject.as_deref(), Some("Electricity"));
        assert_eq!(out.text, "Electrical power\nP = U × I");
    }

    #[test]
    fn normalize_strips_bom_crlf_and_nul() {
        assert_eq!(normalize("\u{feff}a\r\nb\rc\0"), "a\nb\nc");
    }

    #[test]
    fn garbage_pdf_is_a_format_error() {
        let err = extract(Path::new("x.pdf"), DocumentFormat::Pdf, b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, Error::IngestFormat { .. }));
    }
}
