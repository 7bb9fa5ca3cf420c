//! Output encodings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use crate::error::{Result, StencilError};

/// Image encoding of rendered designs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    /// Encode `image`. `quality` applies to JPEG only.
    pub fn encode(self, image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match self {
            OutputFormat::Png => {
                image
                    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                    .map_err(|e| StencilError::Render(format!("PNG encoding failed: {}", e)))?;
            }
            OutputFormat::Jpeg => {
                let flat = flatten_on_white(image);
                JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
                    .encode_image(&flat)
                    .map_err(|e| StencilError::Render(format!("JPEG encoding failed: {}", e)))?;
            }
        }
        Ok(bytes)
    }

    /// `data:` URL for encoded bytes of this format.
    pub fn data_url(self, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", self.mime(), STANDARD.encode(bytes))
    }
}

impl FromStr for OutputFormat {
    type Err = StencilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(StencilError::Validation(format!(
                "unknown output format '{}' (expected png or jpeg)",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        })
    }
}

/// JPEG has no alpha; composite onto white.
fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
