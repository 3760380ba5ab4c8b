use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ExtractError;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
}

impl InputKind {
    /// Classifies `path` by extension, case-insensitively.
    pub fn detect(path: &Path) -> Result<Self, ExtractError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if extension == "pdf" {
            Ok(Self::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Ok(Self::Image)
        } else {
            Err(ExtractError::UnsupportedFileType {
                path: path.to_path_buf(),
                extension,
            })
        }
    }
}

/// Lists supported inputs directly inside `dir`, sorted by name.
pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut files = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && InputKind::detect(path).is_ok())
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

/// Re-encodes a raster input as PNG at `target` so every page image in the
/// output directory shares one format. Returns the image size in pixels.
pub fn save_as_png(source: &Path, target: &Path) -> Result<(u32, u32), ExtractError> {
    let image = image::open(source)?;
    debug!(
        source = %source.display(),
        width = image.width(),
        height = image.height(),
        "normalizing raster input"
    );
    image.save_with_format(target, image::ImageFormat::Png)?;
    Ok((image.width(), image.height()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{InputKind, list_input_files, save_as_png};
    use crate::error::ExtractError;

    #[test]
    fn detects_kind_by_extension() {
        assert_eq!(
            InputKind::detect(Path::new("report.PDF")).expect("pdf"),
            InputKind::Pdf
        );
        assert_eq!(
            InputKind::detect(Path::new("scan.Jpeg")).expect("jpeg"),
            InputKind::Image
        );
        assert!(matches!(
            InputKind::detect(Path::new("notes.docx")),
            Err(ExtractError::UnsupportedFileType { .. })
        ));
        assert!(InputKind::detect(Path::new("no_extension")).is_err());
    }

    #[test]
    fn lists_only_supported_files() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        for name in ["b.pdf", "a.png", "readme.txt"] {
            std::fs::write(dir.path().join(name), b"x").expect("fixture should be written");
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).expect("dir should be created");

        let files = list_input_files(dir.path()).expect("listing should succeed");
        let names = files
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.png", "b.pdf"]);
    }

    #[test]
    fn converts_raster_to_png() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let source = dir.path().join("scan.bmp");
        image::RgbImage::from_pixel(8, 4, image::Rgb([255, 255, 255]))
            .save(&source)
            .expect("bmp fixture should be written");

        let target = dir.path().join("scan_page1.png");
        let size = save_as_png(&source, &target).expect("conversion should succeed");
        assert_eq!(size, (8, 4));
        assert_eq!(
            image::ImageFormat::from_path(&target).expect("format"),
            image::ImageFormat::Png
        );
        assert!(target.is_file());
    }
}
