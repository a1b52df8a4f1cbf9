use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::fetch::Fetch;
use super::LogEntry;
use crate::generate::{self, GenerateError};
use crate::render::{Bindings, ConcreteFile};
use crate::schema::GenerateKind;
use crate::text::is_text;
use crate::transform::substitute;

/// One file write, run on a worker thread.
pub(super) struct FileJob<'a> {
    pub name: &'a str,
    pub path: PathBuf,
    pub file: &'a ConcreteFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Effect {
    Created,
    Downloaded,
    Generated,
    Skipped,
    Failed,
}

impl Effect {
    pub fn wrote(self) -> bool {
        matches!(self, Effect::Created | Effect::Downloaded | Effect::Generated)
    }
}

pub(super) struct JobOutcome {
    pub effect: Effect,
    pub log: LogEntry,
}

/// Produce a file's bytes and write them.
///
/// A generator consumes the file's inline text as its own input; otherwise
/// inline content wins over a URL, and a file with neither is created empty.
pub(super) fn write_file(job: &FileJob<'_>, bindings: &Bindings, fetcher: &dyn Fetch) -> JobOutcome {
    let source = &job.file.source;
    let shown = job.path.display().to_string();

    if let Some(kind) = &source.generate {
        return generate_file(job, kind, shown);
    }

    if let Some(content) = &source.content {
        return match write_bytes(&job.path, content.as_bytes()) {
            Ok(()) => JobOutcome {
                effect: Effect::Created,
                log: LogEntry::success(
                    format!("Created file: {}", job.name),
                    Some(format!("{shown} ({} bytes)", content.len())),
                ),
            },
            Err(e) => failed(format!("Failed to create file: {}", job.name), e),
        };
    }

    if let Some(url) = &source.url {
        let body = match fetcher.fetch(url) {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "download failed");
                return failed(format!("Failed to download: {}", job.name), format!("{url}: {e}"));
            }
        };
        let body = substitute_text_body(body, bindings);
        return match write_bytes(&job.path, &body) {
            Ok(()) => JobOutcome {
                effect: Effect::Downloaded,
                log: LogEntry::success(
                    format!("Downloaded: {}", job.name),
                    Some(format!("{url} -> {shown}")),
                ),
            },
            Err(e) => failed(format!("Failed to write download: {}", job.name), e),
        };
    }

    match write_bytes(&job.path, b"") {
        Ok(()) => JobOutcome {
            effect: Effect::Created,
            log: LogEntry::success(format!("Created file: {}", job.name), Some(shown)),
        },
        Err(e) => failed(format!("Failed to create file: {}", job.name), e),
    }
}

fn generate_file(job: &FileJob<'_>, kind: &GenerateKind, shown: String) -> JobOutcome {
    match generate::generate(job.file, job.name, &job.path) {
        Ok(()) => JobOutcome {
            effect: Effect::Generated,
            log: LogEntry::success(format!("Generated {}: {}", kind.as_str(), job.name), Some(shown)),
        },
        Err(GenerateError::Unsupported(kind)) => JobOutcome {
            effect: Effect::Skipped,
            log: LogEntry::warning(
                format!("Unknown generator type: {kind}"),
                Some(format!(
                    "File '{}' was skipped. Supported generators: image, database",
                    job.name
                )),
            ),
        },
        Err(e) => failed(format!("Failed to generate {}: {}", kind.as_str(), job.name), e.to_string()),
    }
}

/// Downloaded text gets placeholder substitution; binary bodies are kept as-is.
fn substitute_text_body(body: Vec<u8>, bindings: &Bindings) -> Vec<u8> {
    if !is_text(&body) {
        return body;
    }
    match String::from_utf8(body) {
        Ok(text) => substitute(&text, bindings).into_bytes(),
        Err(e) => e.into_bytes(),
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), String> {
    debug!(path = %path.display(), bytes = bytes.len(), "writing file");
    std::fs::write(path, bytes).map_err(|e| format!("Error: {e}"))
}

fn failed(message: String, details: String) -> JobOutcome {
    JobOutcome {
        effect: Effect::Failed,
        log: LogEntry::error(message, Some(details)),
    }
}
