use std::collections::HashSet;
use std::sync::OnceLock;

use tantivy::tokenizer::{
    AsciiFoldingFilter, LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream,
};

// Folded before stop-word removal, so entries are listed without accents.
const STOP_WORDS: &[&str] = &[
    // English
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on",
    "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there",
    "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom", "whose", "can", "could",
    "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have", "had", "having", "me", "my", "you",
    "your", "we", "our", "s", "about", "please", "explain", "tell",
    // French
    "le", "la", "les", "l", "un", "une", "des", "de", "du", "d", "et", "ou", "est", "sont", "en", "au", "aux", "ce",
    "ces", "cet", "cette", "que", "qu", "qui", "quoi", "quel", "quelle", "quels", "quelles", "comment", "pourquoi",
    "je", "tu", "il", "elle", "nous", "vous", "ils", "elles", "mon", "ma", "mes", "son", "sa", "ses", "pour", "par",
    "sur", "dans", "avec", "sans", "pas", "ne", "se", "c", "j", "m", "n", "t", "y", "moi", "explique", "expliquer",
    "peux", "pouvez",
];

const MAX_TOKEN_LEN: usize = 40;

/// Lowercasing, accent folding, stop-word removal over tantivy's simple
/// tokenizer. Cheap to clone.
#[derive(Clone)]
pub struct Analyzer {
    inner: TextAnalyzer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        let inner = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(AsciiFoldingFilter)
            .filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
            .build();
        Self { inner }
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        // token_stream needs &mut; analyzers are cloned per call.
        let mut analyzer = self.inner.clone();
        let mut stream = analyzer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }
}

fn shared() -> &'static Analyzer {
    static ANALYZER: OnceLock<Analyzer> = OnceLock::new();
    ANALYZER.get_or_init(Analyzer::new)
}

/// Analyze `text` with the shared analyzer.
pub fn tokenize(text: &str) -> Vec<String> {
    shared().tokens(text)
}

/// Fraction of the distinct `query_terms` that occur in `text_terms`.
/// Zero when the query has no terms.
pub fn term_overlap(query_terms: &[String], text_terms: &[String]) -> f32 {
    let query: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
    if query.is_empty() {
        return 0.0;
    }
    let text: HashSet<&str> = text_terms.iter().map(String::as_str).collect();
    let hits = query.iter().filter(|t| text.contains(*t)).count();
    hits as f32 / query.len() as f32
}

/// Whether `needle` occurs as a contiguous run inside `haystack`.
pub fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
