//! Binary payloads for files declared with `generate="..."`.
//!
//! Each generator writes straight to its destination path. Generator
//! parameters come from the file's attributes and from `key="value"` pairs
//! or nested elements in its generate config; placeholders are already
//! resolved by expansion.

mod database;
mod image;

use std::path::Path;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::render::ConcreteFile;
use crate::schema::GenerateKind;

pub use self::database::{database_sql, generate_database};
pub use self::image::{generate_image, parse_hex_color, ImageConfig, ImageKind};

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("unknown generator '{0}'")]
    Unsupported(String),

    #[error("invalid generator config: {0}")]
    Config(String),

    #[error("image encoding failed: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run the generator a file asks for, writing the result to `path`.
pub fn generate(file: &ConcreteFile, name: &str, path: &Path) -> Result<(), GenerateError> {
    match &file.source.generate {
        Some(GenerateKind::Image) => generate_image(&ImageConfig::for_file(file, name), path),
        Some(GenerateKind::Database) => generate_database(file, path),
        Some(GenerateKind::Other(kind)) => Err(GenerateError::Unsupported(kind.clone())),
        None => Err(GenerateError::Unsupported(String::new())),
    }
}

fn pair_pattern() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| {
        Regex::new(r#"([A-Za-z][A-Za-z0-9_-]*)\s*=\s*["']([^"']*)["']"#)
            .expect("key=value pattern must compile")
    })
}

/// `key="value"` pairs found anywhere in a generator config string.
pub(crate) fn config_pairs(config: &str) -> Vec<(String, String)> {
    pair_pattern()
        .captures_iter(config)
        .map(|caps| {
            let value = quick_xml::escape::unescape(&caps[2])
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| caps[2].to_string());
            (caps[1].to_string(), value)
        })
        .collect()
}
