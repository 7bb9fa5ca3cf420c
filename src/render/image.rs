//! Embedded image elements.
//!
//! `sourceData` is a `data:image/...;base64,` URL or bare base64. The decoded
//! bitmap is resized to the element box (`width·scale.x × height·scale.y`).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use tracing::debug;

use super::{Layer, MAX_LAYER_PIXELS, Paint, clip_box};
use crate::document::{ImageProps, Position, Scale};
use crate::error::{Result, StencilError};

/// Decode `sourceData` into raw image bytes.
pub fn decode_source(source: &str) -> Result<Vec<u8>> {
    let payload = match source.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => {
            if !header.ends_with(";base64") {
                return Err(StencilError::Image(
                    "only base64 data URLs are supported".into(),
                ));
            }
            data
        }
        _ => source,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(cleaned)
        .map_err(|e| StencilError::Image(format!("invalid base64 image data: {}", e)))
}

/// Layer for an image element, cropped to `surface`.
pub(crate) fn image_layer(
    props: &ImageProps,
    center: Position,
    scale: Scale,
    surface: (u32, u32),
) -> Result<Option<Layer>> {
    if props.source_data.trim().is_empty() {
        debug!("image element has no source data, skipping");
        return Ok(None);
    }
    let w = (props.width * scale.x).abs().round();
    let h = (props.height * scale.y).abs().round();
    if w == 0.0 || h == 0.0 {
        return Ok(None);
    }
    let left = (center.x - w / 2.0).round();
    let top = (center.y - h / 2.0).round();
    let Some((x, y, width, height)) = clip_box(left, top, w, h, surface)? else {
        return Ok(None);
    };
    if w * h > MAX_LAYER_PIXELS {
        return Err(StencilError::Render(format!(
            "image element too large ({}x{})",
            w, h
        )));
    }
    let (w, h) = (w as u32, h as u32);

    let bytes = decode_source(&props.source_data)?;
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| StencilError::Image(format!("failed to decode image: {}", e)))?
        .to_rgba8();
    let resized = if decoded.dimensions() == (w, h) {
        decoded
    } else {
        image::imageops::resize(&decoded, w, h, FilterType::Triangle)
    };
    let visible = image::imageops::crop_imm(
        &resized,
        (x - left as i64) as u32,
        (y - top as i64) as u32,
        width as u32,
        height as u32,
    )
    .to_image();

    Ok(Some(Layer {
        x,
        y,
        width,
        height,
        coverage: vec![1.0; width * height],
        paint: Paint::Pixels(visible),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    const SURFACE: (u32, u32) = (64, 64);

    fn png_data_url(img: &RgbaImage) -> String {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(bytes))
    }

    #[test]
    fn decodes_data_url_and_bare_base64() {
        assert_eq!(decode_source("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert_eq!(decode_source("aGk=").unwrap(), b"hi");
        assert!(decode_source("data:text/plain,hi").is_err());
        assert!(decode_source("!!!").is_err());
    }

    #[test]
    fn image_is_resized_to_element_box() {
        let src = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let props = ImageProps {
            source_data: png_data_url(&src),
            width: 8.0,
            height: 4.0,
        };
        let layer = image_layer(&props, Position::new(10.0, 10.0), Scale::uniform(2.0), SURFACE)
            .unwrap()
            .unwrap();
        assert_eq!((layer.width, layer.height), (16, 8));
        assert_eq!((layer.x, layer.y), (2, 6));
        match layer.paint {
            Paint::Pixels(img) => assert_eq!(img.get_pixel(5, 5).0, [10, 20, 30, 255]),
            Paint::Solid(_) => unreachable!(),
        }
    }

    #[test]
    fn empty_source_draws_nothing_and_garbage_fails() {
        let mut props = ImageProps {
            source_data: String::new(),
            width: 10.0,
            height: 10.0,
        };
        let center = Position::new(10.0, 10.0);
        assert!(image_layer(&props, center, Scale::default(), SURFACE).unwrap().is_none());
        props.source_data = STANDARD.encode(b"not an image");
        assert!(matches!(
            image_layer(&props, center, Scale::default(), SURFACE),
            Err(StencilError::Image(_))
        ));
    }

    #[test]
    fn partly_visible_image_is_cropped() {
        let mut src = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        for y in 0..4 {
            src.put_pixel(0, y, Rgba([255, 0, 0, 255]));
            src.put_pixel(1, y, Rgba([255, 0, 0, 255]));
        }
        let props = ImageProps {
            source_data: png_data_url(&src),
            width: 4.0,
            height: 4.0,
        };
        // left half hangs off the surface
        let layer = image_layer(&props, Position::new(0.0, 10.0), Scale::default(), SURFACE)
            .unwrap()
            .unwrap();
        assert_eq!((layer.x, layer.y, layer.width, layer.height), (0, 8, 2, 4));
        match layer.paint {
            Paint::Pixels(img) => {
                assert_eq!(img.dimensions(), (2, 4));
                assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
            }
            Paint::Solid(_) => unreachable!(),
        }
    }

    #[test]
    fn absurd_image_size_is_render_error() {
        let props = ImageProps {
            source_data: png_data_url(&RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]))),
            width: 100.0,
            height: 100.0,
        };
        assert!(matches!(
            image_layer(&props, Position::new(32.0, 32.0), Scale::uniform(5000.0), SURFACE),
            Err(StencilError::Render(_))
        ));
    }
}
