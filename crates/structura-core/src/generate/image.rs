use std::io::Cursor;
use std::path::Path;

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};

use super::{config_pairs, GenerateError};
use crate::render::ConcreteFile;

const MAX_DIMENSION: u32 = 10_000;
const DEFAULT_BACKGROUND: (u8, u8, u8) = (0xCC, 0xCC, 0xCC);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

/// Parameters of a solid-colour placeholder image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub kind: ImageKind,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            background: "#CCCCCC".to_string(),
            kind: ImageKind::Png,
        }
    }
}

impl ImageConfig {
    /// Defaults, then the format implied by the extension, then config pairs,
    /// then the file's own attributes.
    pub fn for_file(file: &ConcreteFile, name: &str) -> Self {
        let mut config = Self::default();
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            config.kind = ImageKind::Jpeg;
        }
        let from_config = file
            .source
            .generate_config
            .as_deref()
            .map(config_pairs)
            .unwrap_or_default();
        for (key, value) in from_config.iter().chain(file.attributes.iter()) {
            config.set(key, value);
        }
        config
    }

    fn set(&mut self, key: &str, value: &str) {
        let value = value.trim();
        match key {
            "width" => {
                if let Ok(w) = value.parse::<u32>() {
                    self.width = w.clamp(1, MAX_DIMENSION);
                }
            }
            "height" => {
                if let Ok(h) = value.parse::<u32>() {
                    self.height = h.clamp(1, MAX_DIMENSION);
                }
            }
            "background" => self.background = value.to_string(),
            "format" => match value.to_ascii_lowercase().as_str() {
                "png" => self.kind = ImageKind::Png,
                "jpg" | "jpeg" => self.kind = ImageKind::Jpeg,
                _ => {}
            },
            _ => {}
        }
    }
}

/// `#RGB` or `#RRGGBB`, with or without the `#`.
pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => Some((
            channel(&hex[0..1].repeat(2))?,
            channel(&hex[1..2].repeat(2))?,
            channel(&hex[2..3].repeat(2))?,
        )),
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => None,
    }
}

pub fn generate_image(config: &ImageConfig, path: &Path) -> Result<(), GenerateError> {
    let (r, g, b) = parse_hex_color(&config.background).unwrap_or(DEFAULT_BACKGROUND);
    let img: RgbImage = ImageBuffer::from_pixel(config.width, config.height, Rgb([r, g, b]));

    let format = match config.kind {
        ImageKind::Png => ImageFormat::Png,
        ImageKind::Jpeg => ImageFormat::Jpeg,
    };
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format)?;

    std::fs::write(path, buffer.into_inner()).map_err(|e| GenerateError::Io {
        context: format!("writing {}", path.display()),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FileSource, GenerateKind};
    use rstest::rstest;

    fn image_file(config: Option<&str>, attributes: &[(&str, &str)]) -> ConcreteFile {
        ConcreteFile {
            source: FileSource {
                generate: Some(GenerateKind::Image),
                generate_config: config.map(String::from),
                ..Default::default()
            },
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[rstest]
    #[case("#FF0000", Some((255, 0, 0)))]
    #[case("3B82F6", Some((59, 130, 246)))]
    #[case("#0f0", Some((0, 255, 0)))]
    #[case("#GGG", None)]
    #[case("#12", None)]
    #[case("#1234567", None)]
    #[case("#ééé", None)]
    fn hex_colors(#[case] input: &str, #[case] expected: Option<(u8, u8, u8)>) {
        assert_eq!(parse_hex_color(input), expected);
    }

    #[test]
    fn attributes_override_config_and_extension() {
        let file = image_file(
            Some(r##"width="800" height="600" background="#00FF00""##),
            &[("width", "64"), ("format", "png")],
        );
        let config = ImageConfig::for_file(&file, "cover.JPG");
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 600);
        assert_eq!(config.background, "#00FF00");
        assert_eq!(config.kind, ImageKind::Png);
    }

    #[test]
    fn dimensions_are_clamped_and_junk_ignored() {
        let file = image_file(None, &[("width", "0"), ("height", "99999"), ("format", "gif")]);
        let config = ImageConfig::for_file(&file, "x.jpeg");
        assert_eq!(config.width, 1);
        assert_eq!(config.height, MAX_DIMENSION);
        assert_eq!(config.kind, ImageKind::Jpeg);
    }

    #[test]
    fn writes_png_and_jpeg() {
        let tmp = tempfile::tempdir().unwrap();
        let png = tmp.path().join("a.png");
        generate_image(&ImageConfig::default(), &png).unwrap();
        assert!(std::fs::read(&png).unwrap().starts_with(&[0x89, 0x50, 0x4E, 0x47]));

        let jpg = tmp.path().join("a.jpg");
        let config = ImageConfig {
            width: 20,
            height: 10,
            background: "bad".into(),
            kind: ImageKind::Jpeg,
        };
        generate_image(&config, &jpg).unwrap();
        assert!(std::fs::read(&jpg).unwrap().starts_with(&[0xFF, 0xD8, 0xFF]));
    }
}
