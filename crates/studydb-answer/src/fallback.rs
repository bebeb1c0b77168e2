//! Curated knowledge base consulted when the corpus cannot answer.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use studydb_core::config::FallbackSettings;
use studydb_core::error::{Error, Result};

const BUILTIN: &str = include_str!("../knowledge/default.toml");

/// A multi-word trigger needs at least this many of its terms in the query
/// to match partially, so one shared word such as "law" is never enough.
const MIN_PARTIAL_TERMS: usize = 2;

/// A hand-written answer keyed by trigger phrases.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FallbackEntry {
    pub id: String,
    pub subject: String,
    pub triggers: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub answer: String,
}

#[derive(Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    entry: Vec<FallbackEntry>,
}

/// Trigger phrases pre-analyzed once at load time.
#[derive(Debug)]
struct Compiled {
    entry: FallbackEntry,
    triggers: Vec<Vec<String>>,
}

#[derive(Debug)]
pub struct KnowledgeBase {
    entries: Vec<Compiled>,
    partial_threshold: f32,
}

impl KnowledgeBase {
    pub fn builtin(partial_threshold: f32) -> Result<Self> {
        Self::from_toml(BUILTIN, partial_threshold)
    }

    pub fn from_settings(settings: &FallbackSettings) -> Result<Self> {
        match settings.knowledge_path.as_deref() {
            Some(p) => {
                let path = studydb_core::config::expand_path(p);
                let kb = Self::from_path(&path, settings.partial_match_threshold)?;
                info!("loaded {} fallback entries from {}", kb.len(), path.display());
                Ok(kb)
            }
            None => Self::builtin(settings.partial_match_threshold),
        }
    }

    pub fn from_path(path: &Path, partial_threshold: f32) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text, partial_threshold)
    }

    pub fn from_toml(text: &str, partial_threshold: f32) -> Result<Self> {
        let file: KnowledgeFile =
            toml::from_str(text).map_err(|e| Error::InvalidConfig(format!("knowledge base: {e}")))?;
        let entries = file
            .entry
            .into_iter()
            .map(|mut entry| {
                entry.answer = entry.answer.trim().to_string();
                let triggers = entry
                    .triggers
                    .iter()
                    .map(|t| studydb_text::tokenize(t))
                    .filter(|t| !t.is_empty())
                    .collect();
                Compiled { entry, triggers }
            })
            .collect();
        Ok(Self { entries, partial_threshold })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the curated entry for `query`.
    ///
    /// 1. A trigger occurring as a contiguous phrase in the query, among
    ///    entries of `subject` (all entries when no subject is given). The
    ///    longest such trigger wins.
    /// 2. Otherwise the entry, from any subject, whose trigger has the
    ///    largest share of its terms present in the query, provided that
    ///    share reaches the partial-match threshold and at least
    ///    `MIN_PARTIAL_TERMS` terms (all of them for shorter triggers) match.
    pub fn lookup(&self, query: &str, subject: Option<&str>) -> Option<&FallbackEntry> {
        let terms = studydb_text::tokenize(query);
        if terms.is_empty() {
            return None;
        }

        let exact = self
            .entries
            .iter()
            .filter(|c| subject.map_or(true, |s| c.entry.subject.eq_ignore_ascii_case(s.trim())))
            .filter_map(|c| {
                c.triggers
                    .iter()
                    .filter(|t| studydb_text::contains_phrase(&terms, t))
                    .map(Vec::len)
                    .max()
                    .map(|len| (c, len))
            })
            // max_by_key keeps the last maximum; reverse so earlier entries win ties.
            .rev()
            .max_by_key(|(_, len)| *len);
        if let Some((c, _)) = exact {
            debug!("fallback exact match: {}", c.entry.id);
            return Some(&c.entry);
        }

        let mut best: Option<(&Compiled, f32, usize)> = None;
        for c in &self.entries {
            for trigger in &c.triggers {
                let (matched, total) = matched_terms(trigger, &terms);
                if matched == 0 || matched < total.min(MIN_PARTIAL_TERMS) {
                    continue;
                }
                let share = matched as f32 / total as f32;
                if share < self.partial_threshold {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((_, s, len)) => share > s || (share == s && trigger.len() > len),
                };
                if better {
                    best = Some((c, share, trigger.len()));
                }
            }
        }
        best.map(|(c, share, _)| {
            debug!("fallback partial match: {} ({share:.2})", c.entry.id);
            &c.entry
        })
    }

    /// Suggested questions for `subject`, or for every subject when `None`.
    pub fn suggested_questions(&self, subject: Option<&str>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|c| subject.map_or(true, |s| c.entry.subject.eq_ignore_ascii_case(s.trim())))
            .flat_map(|c| c.entry.suggestions.iter().cloned())
            .collect()
    }

}

/// Distinct trigger terms found in `terms`, and the distinct trigger term count.
fn matched_terms(trigger: &[String], terms: &[String]) -> (usize, usize) {
    let distinct: HashSet<&String> = trigger.iter().collect();
    let matched = distinct.iter().filter(|t| terms.contains(**t)).count();
    (matched, distinct.len())
}
