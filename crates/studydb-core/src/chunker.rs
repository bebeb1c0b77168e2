//! Word-window chunking with a fixed word overlap.
//!
//! The text is cut into word units: a run of non-whitespace plus the
//! whitespace that follows it (leading whitespace sticks to the first unit).
//! Unit boundaries always sit on char boundaries, and the units concatenate
//! back to the exact input, so chunks never split a multi-byte character and
//! the non-overlapping parts of the chunks rebuild the document byte for byte.

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Slice `document` into windows of `chunk_size` words where consecutive
/// windows share `overlap` words. Requires `0 <= overlap < chunk_size`.
pub fn chunk(document: &Document, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(Error::InvalidConfig(format!(
            "chunking needs 0 <= overlap < chunk_size, got overlap={overlap} chunk_size={chunk_size}"
        )));
    }
    Ok(windows(&document.text, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(index, w)| Chunk {
            document_id: document.id.clone(),
            subject: document.subject.clone(),
            index,
            offset: w.start,
            overlap: w.overlap,
            text: document.text[w.start..w.end].to_string(),
        })
        .collect())
}

/// Rebuild the original text from a document's chunks, in order.
pub fn reassemble(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::fresh_text).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: usize,
    end: usize,
    overlap: usize,
}

fn windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<Window> {
    if text.is_empty() {
        return Vec::new();
    }
    let bounds = unit_starts(text);
    let units = bounds.len();
    let byte_at = |unit: usize| if unit < units { bounds[unit] } else { text.len() };
    let stride = chunk_size - overlap;

    let mut out = Vec::new();
    let mut start = 0usize;
    let mut prev_end: Option<usize> = None;
    loop {
        let end = (start + chunk_size).min(units);
        let shared = prev_end.map_or(0, |pe| byte_at(pe) - byte_at(start));
        out.push(Window { start: byte_at(start), end: byte_at(end), overlap: shared });
        if end >= units {
            break;
        }
        prev_end = Some(end);
        start += stride;
    }
    out
}

fn unit_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut prev_ws = true;
    for (i, ch) in text.char_indices() {
        let ws = ch.is_whitespace();
        if !ws && prev_ws {
            starts.push(i);
        }
        prev_ws = ws;
    }
    match starts.first_mut() {
        Some(first) => *first = 0,
        None => starts.push(0),
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentFormat;

    fn doc(text: &str) -> Document {
        Document {
            id: "d".into(),
            path: "d.txt".into(),
            title: None,
            subject: "General".into(),
            format: DocumentFormat::PlainText,
            text: text.to_string(),
            content_hash: String::new(),
            ingested_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn round_trip_over_many_configurations() {
        let texts = [
            "",
            "   ",
            "one",
            "  leading and trailing  ",
            "La loi d'Ohm : U = R × I, où R est la résistance en Ω.\n\nÉnergie   électrique\tet puissance.",
            "a b c d e f g h i j k l m n o p q r s t u v w x y z",
        ];
        for text in texts {
            for size in 1..8 {
                for overlap in 0..size {
                    let chunks = chunk(&doc(text), size, overlap).unwrap();
                    assert_eq!(reassemble(&chunks), text, "size={size} overlap={overlap}");
                }
            }
        }
    }

    #[test]
    fn consecutive_chunks_share_exactly_overlap_words() {
        let text = "w1 w2 w3 w4 w5 w6 w7 w8 w9 w10";
        let chunks = chunk(&doc(text), 4, 2).unwrap();
        assert_eq!(chunks[0].text.trim(), "w1 w2 w3 w4");
        assert_eq!(chunks[1].text.trim(), "w3 w4 w5 w6");
        assert_eq!(&chunks[1].text[..chunks[1].overlap], "w3 w4 ");
        assert_eq!(chunks.last().unwrap().text.trim(), "w7 w8 w9 w10");
        assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn multibyte_text_is_never_split() {
        let text = "ééé ΩΩΩ ××× 電気 回路";
        for c in chunk(&doc(text), 2, 1).unwrap() {
            assert!(text.is_char_boundary(c.offset));
            assert!(text.is_char_boundary(c.offset + c.text.len()));
        }
    }

    #[test]
    fn rejects_overlap_not_below_size() {
        assert!(chunk(&doc("a b"), 3, 3).is_err());
        assert!(chunk(&doc("a b"), 0, 0).is_err());
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = chunk(&doc("U = R × I"), 200, 40).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "U = R × I");
        assert_eq!(chunks[0].overlap, 0);
    }
}
