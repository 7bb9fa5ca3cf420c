//! # Export Packager
//!
//! Bundles rendered designs into one ZIP archive.
//!
//! Item *i* (1-based) contributes `design_<i>.<ext>` and, when its caption
//! is non-empty after trimming, `design_<i>.txt`.

use std::io::{Cursor, Write};
use std::path::Path;
use tracing::info;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::batch::RenderedItem;
use crate::error::{Result, StencilError};

/// Build the archive in memory.
pub fn package(items: &[RenderedItem]) -> Result<Vec<u8>> {
    if items.is_empty() {
        return Err(StencilError::Packaging("nothing to export".into()));
    }

    let zip_err = |e: zip::result::ZipError| StencilError::Packaging(format!("archive error: {}", e));
    // encoded images are already compressed
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let mut captions = 0usize;
    for (i, item) in items.iter().enumerate() {
        let base = format!("design_{}", i + 1);

        zip.start_file(format!("{}.{}", base, item.format.extension()), stored)
            .map_err(zip_err)?;
        zip.write_all(&item.image)?;

        if let Some(caption) = item.caption.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            zip.start_file(format!("{}.txt", base), deflated)
                .map_err(zip_err)?;
            zip.write_all(caption.as_bytes())?;
            captions += 1;
        }
    }
    let bytes = zip.finish().map_err(zip_err)?.into_inner();

    info!(
        images = items.len(),
        captions,
        bytes = bytes.len(),
        "packaged archive"
    );
    Ok(bytes)
}

/// Package `items` and write the archive to `path`.
pub fn write_archive(items: &[RenderedItem], path: &Path) -> Result<()> {
    let bytes = package(items)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use crate::render::OutputFormat;
    use std::io::Read;

    fn item(caption: Option<&str>, format: OutputFormat) -> RenderedItem {
        RenderedItem {
            image: vec![1, 2, 3],
            format,
            row: Row::new(),
            caption: caption.map(str::to_string),
            filename: String::new(),
        }
    }

    #[test]
    fn entry_count_follows_captions() {
        let items = vec![
            item(Some("First"), OutputFormat::Png),
            item(None, OutputFormat::Png),
            item(Some("   "), OutputFormat::Png),
            item(Some("Fourth"), OutputFormat::Png),
            item(Some(""), OutputFormat::Png),
        ];
        let bytes = package(&items).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 7);

        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "design_1.png",
                "design_1.txt",
                "design_2.png",
                "design_3.png",
                "design_4.png",
                "design_4.txt",
                "design_5.png",
            ]
        );

        let mut caption = String::new();
        archive
            .by_name("design_4.txt")
            .unwrap()
            .read_to_string(&mut caption)
            .unwrap();
        assert_eq!(caption, "Fourth");

        let mut image = Vec::new();
        archive.by_name("design_2.png").unwrap().read_to_end(&mut image).unwrap();
        assert_eq!(image, vec![1, 2, 3]);
    }

    #[test]
    fn jpeg_items_use_jpg_extension() {
        let bytes = package(&[item(None, OutputFormat::Jpeg)]).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.file_names().collect::<Vec<_>>(), vec!["design_1.jpg"]);
    }

    #[test]
    fn empty_export_is_packaging_error() {
        let err = package(&[]).unwrap_err();
        assert!(matches!(err, StencilError::Packaging(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn writes_archive_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("designs.zip");
        write_archive(&[item(Some("hi"), OutputFormat::Png)], &path).unwrap();
        let archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
    }
}
