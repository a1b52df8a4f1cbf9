#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::check::IssueKind;

#[derive(Debug, Error, Diagnostic)]
pub enum StructuraError {
    #[error("XML syntax error at byte {position}: {message}")]
    #[diagnostic(help(
        "Schemas use the elements template, hooks, post-create, folder, file, if, else and repeat"
    ))]
    XmlSyntax { message: String, position: u64 },

    #[error("Circular inheritance detected: {}", chain.join(" -> "))]
    #[diagnostic(help("Remove the circular dependency in your template extends chain"))]
    CircularInheritance { chain: Vec<String> },

    #[error("Failed to resolve base template '{template}': {message}")]
    #[diagnostic(help("Check the extends attribute and the template library"))]
    InheritanceError { template: String, message: String },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}")]
    #[diagnostic(help("Check the TOML syntax in your structura config file"))]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to read archive {name}")]
    #[diagnostic(help("Only zip archives are supported"))]
    Archive {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Invalid glob pattern: {pattern}")]
    GlobPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to read or write the created-items manifest")]
    Manifest {
        #[source]
        source: serde_json::Error,
    },
}

impl StructuraError {
    /// Maps a fatal error onto the validation issue taxonomy, if it belongs there.
    pub fn issue_kind(&self) -> Option<IssueKind> {
        match self {
            StructuraError::XmlSyntax { .. } => Some(IssueKind::XmlSyntax),
            StructuraError::CircularInheritance { .. } => Some(IssueKind::CircularInheritance),
            StructuraError::InheritanceError { .. } => Some(IssueKind::InheritanceError),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StructuraError>;
