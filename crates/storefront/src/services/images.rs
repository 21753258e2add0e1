//! Product image storage.
//!
//! Uploads are renamed to `<uuid hex>.<ext>`, decoded once to prove they
//! are real images, then written under the upload directory. The client's
//! filename is only consulted for its extension.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

/// Extensions accepted for product images.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Errors from image intake and removal.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported image type")]
    UnsupportedExtension,

    #[error("invalid image")]
    InvalidImage,

    #[error("image storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem-backed store for uploaded product images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Io` if the directory cannot be created.
    pub async fn ensure_root(&self) -> Result<(), ImageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Validate and store an upload, returning the stored filename.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::UnsupportedExtension` if the client filename has
    /// no allowed extension.
    /// Returns `ImageError::InvalidImage` if the payload does not decode.
    /// Returns `ImageError::Io` if the file cannot be written.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn save(&self, original_name: &str, data: Bytes) -> Result<String, ImageError> {
        let extension = allowed_extension(original_name).ok_or(ImageError::UnsupportedExtension)?;
        let filename = format!("{}.{extension}", Uuid::new_v4().simple());

        let payload = data.clone();
        tokio::task::spawn_blocking(move || decode_check(&payload))
            .await
            .map_err(|_| ImageError::InvalidImage)??;

        tokio::fs::write(self.root.join(&filename), &data).await?;
        tracing::info!(filename = %filename, "Image stored");
        Ok(filename)
    }

    /// Remove a stored image. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Io` for failures other than a missing file.
    #[instrument(skip(self))]
    pub async fn delete(&self, filename: &str) -> Result<(), ImageError> {
        let Some(path) = self.path_for(filename) else {
            tracing::warn!(filename, "Refusing to delete image outside upload directory");
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(filename, "Image already removed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a stored filename inside the upload directory.
    ///
    /// Returns `None` for anything that is not a bare filename.
    #[must_use]
    pub fn path_for(&self, filename: &str) -> Option<PathBuf> {
        let is_bare = !filename.is_empty()
            && !filename.contains(['/', '\\'])
            && filename != "."
            && filename != "..";
        is_bare.then(|| self.root.join(filename))
    }
}

/// Lower-cased extension of `name` if it is one of [`ALLOWED_EXTENSIONS`].
#[must_use]
pub fn allowed_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn decode_check(data: &[u8]) -> Result<(), ImageError> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| ImageError::InvalidImage)?
        .decode()
        .map(|_| ())
        .map_err(|_| ImageError::InvalidImage)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_bytes() -> Bytes {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("archive.tar.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("shell.php"), None);
        assert_eq!(allowed_extension("png"), None);
        assert_eq!(allowed_extension("image.png.exe"), None);
    }

    #[tokio::test]
    async fn test_save_valid_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let name = store.save("../../Evil Name.PNG", png_bytes()).await.unwrap();
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), 32 + ".png".len());

        let stored = std::fs::read(dir.path().join(&name)).unwrap();
        assert_eq!(stored, png_bytes().to_vec(), "full payload is written");
    }

    #[tokio::test]
    async fn test_rejects_non_image_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let err = store
            .save("fake.jpg", Bytes::from_static(b"definitely not a jpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::InvalidImage));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_bad_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let err = store.save("image.svg", png_bytes()).await.unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedExtension));
    }

    #[tokio::test]
    async fn test_delete_ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let name = store.save("a.png", png_bytes()).await.unwrap();
        store.delete(&name).await.unwrap();
        assert!(!dir.path().join(&name).exists());
        store.delete(&name).await.unwrap();
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let store = ImageStore::new("/srv/uploads");
        assert!(store.path_for("../etc/passwd").is_none());
        assert!(store.path_for("..").is_none());
        assert!(store.path_for("").is_none());
        assert_eq!(
            store.path_for("abc.png").unwrap(),
            PathBuf::from("/srv/uploads/abc.png")
        );
    }
}
