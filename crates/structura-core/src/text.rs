use std::path::Path;

/// Extensions that are never loaded as text, whatever their bytes look like.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "pdf", "zip", "tar", "gz",
    "tgz", "bz2", "xz", "rar", "7z", "exe", "dll", "so", "dylib", "bin", "class", "jar", "pyc",
    "wasm", "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "wav", "ogg", "flac", "avi", "mov",
    "mkv", "db", "sqlite", "sqlite3",
];

pub fn has_binary_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Bytes that are valid UTF-8 and look like text.
pub fn is_text(bytes: &[u8]) -> bool {
    content_inspector::inspect(bytes).is_text() && std::str::from_utf8(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("logo.PNG", true)]
    #[case("data.sqlite", true)]
    #[case("main.rs", false)]
    #[case("Makefile", false)]
    fn binary_extensions(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(has_binary_extension(name), expected);
    }

    #[test]
    fn invalid_utf8_is_not_text() {
        assert!(is_text(b"plain"));
        assert!(!is_text(&[0xff, 0xfe, 0x41, 0x00]));
    }
}
