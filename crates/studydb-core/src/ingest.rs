use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::chunker;
use crate::config::IngestSettings;
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::types::{Chunk, Document, DocumentFormat};

/// Outcome of one ingest run. Files that could not be read or parsed are
/// reported in `skipped`; they never abort the run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<Error>,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        let mut by_format: BTreeMap<&str, usize> = BTreeMap::new();
        for d in &self.documents {
            *by_format.entry(d.format.as_str()).or_default() += 1;
        }
        let formats: Vec<String> = by_format.iter().map(|(f, n)| format!("{f}={n}")).collect();
        format!(
            "{} documents ({}), {} skipped",
            self.documents.len(),
            formats.join(", "),
            self.skipped.len()
        )
    }
}

pub struct Ingestor {
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(settings: IngestSettings) -> Self {
        Self { settings }
    }

    /// Read every supported file under `source_paths`. Directories are walked
    /// recursively in sorted order; the result is sorted by document id.
    pub fn ingest<P: AsRef<Path>>(&self, source_paths: &[P]) -> IngestReport {
        let mut report = IngestReport::default();
        let mut seen = std::collections::HashSet::new();
        for source in source_paths {
            let source = source.as_ref();
            for (file, root) in self.expand(source, &mut report) {
                match self.ingest_file(&file, root.as_deref()) {
                    Ok(doc) => {
                        if seen.insert(doc.id.clone()) {
                            report.documents.push(doc);
                        }
                    }
                    Err(e) => {
                        warn!("skipping {}: {}", file.display(), e);
                        report.skipped.push(e);
                    }
                }
            }
        }
        report.documents.sort_by(|a, b| a.id.cmp(&b.id));
        info!("ingest finished: {}", report.summary());
        report
    }

    /// Ingest a single file. `root` is the directory it was discovered under,
    /// used for the subject-from-directory convention; a file given on its
    /// own takes its parent directory's name instead.
    pub fn ingest_file(&self, path: &Path, root: Option<&Path>) -> Result<Document> {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension)
            .ok_or_else(|| Error::IngestFormat { path: path.to_path_buf(), reason: "unsupported file type".into() })?;

        let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if meta.len() > self.settings.max_file_bytes {
            return Err(Error::IngestFormat {
                path: path.to_path_buf(),
                reason: format!("file is {} bytes, limit is {}", meta.len(), self.settings.max_file_bytes),
            });
        }
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let extracted = extract(path, format, &bytes)?;
        if extracted.text.trim().is_empty() {
            return Err(Error::IngestFormat { path: path.to_path_buf(), reason: "document has no text".into() });
        }

        let subject = extracted
            .subject
            .or_else(|| match root {
                Some(r) => subject_from_path(path, r),
                None => subject_from_parent(path),
            })
            .unwrap_or_else(|| self.settings.default_subject.clone());
        let title = extracted
            .title
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().to_string()));
        debug!("ingested {} as {} ({})", path.display(), subject, format.as_str());

        Ok(Document {
            id: document_id(path),
            path: path.to_path_buf(),
            title,
            subject,
            format,
            content_hash: blake3::hash(extracted.text.as_bytes()).to_hex().to_string(),
            text: extracted.text,
            ingested_at: Utc::now(),
        })
    }

    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        chunker::chunk(document, self.settings.chunk_size, self.settings.chunk_overlap)
    }

    pub fn chunk_all(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all = Vec::new();
        for d in documents {
            all.extend(self.chunk(d)?);
        }
        Ok(all)
    }

    fn expand(&self, source: &Path, report: &mut IngestReport) -> Vec<(PathBuf, Option<PathBuf>)> {
        if source.is_file() {
            return vec![(source.to_path_buf(), None)];
        }
        if !source.is_dir() {
            let err = Error::io(source, std::io::Error::new(std::io::ErrorKind::NotFound, "source path does not exist"));
            warn!("{}", err);
            report.skipped.push(err);
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(source)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files.into_iter().map(|f| (f, Some(source.to_path_buf()))).collect()
    }
}

/// `root/Electricity/ohm.txt` -> `Electricity`. Files directly under the
/// root carry no subject.
fn subject_from_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parent = relative.parent()?;
    let first = parent.components().next()?;
    let name = first.as_os_str().to_string_lossy().trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// `data/Electricity/ohm.txt` -> `Electricity`. Hidden directories (such as
/// scratch `.tmp*` dirs) and bare file names carry no subject.
fn subject_from_parent(path: &Path) -> Option<String> {
    let name = path.parent()?.file_name()?.to_string_lossy().trim().to_string();
    (!name.is_empty() && !name.starts_with('.')).then_some(name)
}

fn document_id(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
