//! Image scanning and validation

use std::path::{Path, PathBuf};

use dimscope_detect::ImagePayload;
use dimscope_types::{Error, Result};
use walkdir::WalkDir;

/// Supported image extensions
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// Check if a path is a supported image file
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Validate an image file and load it for detection
pub fn load_image(path: &Path) -> Result<ImagePayload> {
    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }

    if !is_supported_image(path) {
        return Err(Error::InvalidImage(format!(
            "Unsupported image format: {}",
            path.display()
        )));
    }

    let payload = ImagePayload::from_path(path)?;
    // header must decode, not just sniff
    payload.dimensions()?;
    Ok(payload)
}

/// Scan a directory for image files
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(Error::NotFound(dir.display().to_string()));
    }

    if !dir.is_dir() {
        return Err(Error::InvalidImage(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_supported_image(path))
        .collect();

    // Sort by filename for consistent ordering
    images.sort_by(|a, b| {
        a.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .cmp(b.file_name().and_then(|n| n.to_str()).unwrap_or(""))
    });

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use tempfile::tempdir;

    fn write_png(path: &Path) {
        RgbImage::new(3, 2).save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("a/b/photo.JPG")));
        assert!(is_supported_image(Path::new("shot.webp")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }

    #[test]
    fn test_scan_directory_recurses_and_sorts() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write_png(&dir.path().join("b.png"));
        write_png(&dir.path().join("nested").join("a.png"));
        std::fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let found = scan_directory(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_load_image() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.png");
        write_png(&good);
        let payload = load_image(&good).unwrap();
        assert_eq!(payload.mime(), "image/png");

        let fake = dir.path().join("fake.jpg");
        std::fs::write(&fake, "definitely not a jpeg").unwrap();
        assert!(matches!(load_image(&fake), Err(Error::InvalidImage(_))));

        assert!(matches!(
            load_image(&dir.path().join("missing.png")),
            Err(Error::NotFound(_))
        ));
    }
}
