//! Image upload pipeline: content-type gate, stable filenames, disk storage.
//! Resizing is an external concern; bytes are stored as received.

use std::path::{Path, PathBuf};

use bson::oid::ObjectId;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const USER_IMAGE_DIR: &str = "users";
pub const TOUR_IMAGE_DIR: &str = "tours";

const DEFAULT_USER_PHOTO: &str = "default.jpg";

/// Only images pass the upload gate.
pub fn is_image(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.starts_with("image"))
}

pub fn require_image(content_type: Option<&str>) -> Result<()> {
    if is_image(content_type) {
        Ok(())
    } else {
        Err(Error::BadRequest(
            "Not an image! Please upload only images.".to_string(),
        ))
    }
}

pub fn user_photo_filename(user_id: &ObjectId) -> String {
    format!("user-{}-{}.jpeg", user_id.to_hex(), Uuid::new_v4())
}

/// `index` None is the cover image; Some(n) is the nth gallery image.
pub fn tour_image_filename(tour_id: &ObjectId, index: Option<usize>) -> String {
    match index {
        None => format!("tour-{}-{}-cover.jpeg", tour_id.to_hex(), Uuid::new_v4()),
        Some(n) => format!("tour-{}-{}-{}.jpeg", tour_id.to_hex(), Uuid::new_v4(), n + 1),
    }
}

fn target_path(base: &Path, subdir: &str, filename: &str) -> PathBuf {
    base.join(subdir).join(filename)
}

/// Write an uploaded image under `{base}/{subdir}/{filename}`.
pub async fn store(base: &Path, subdir: &str, filename: &str, bytes: &[u8]) -> Result<()> {
    let dir = base.join(subdir);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(target_path(base, subdir, filename), bytes).await?;
    Ok(())
}

/// Best-effort removal of a replaced image. The stock placeholder is never
/// deleted, and a missing file is not an error.
pub async fn remove_stale(base: &Path, subdir: &str, filename: &str) {
    if filename == DEFAULT_USER_PHOTO {
        return;
    }
    if let Err(err) = tokio::fs::remove_file(target_path(base, subdir, filename)).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(%filename, "failed to remove replaced image: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_gate() {
        assert!(is_image(Some("image/jpeg")));
        assert!(is_image(Some("image/png")));
        assert!(!is_image(Some("application/pdf")));
        assert!(!is_image(None));
        assert!(require_image(Some("text/html")).is_err());
    }

    #[test]
    fn test_filename_shapes() {
        let id = ObjectId::new();
        let photo = user_photo_filename(&id);
        assert!(photo.starts_with(&format!("user-{}-", id.to_hex())));
        assert!(photo.ends_with(".jpeg"));

        let cover = tour_image_filename(&id, None);
        assert!(cover.ends_with("-cover.jpeg"));

        let second = tour_image_filename(&id, Some(1));
        assert!(second.ends_with("-2.jpeg"));
    }

    #[test]
    fn test_filenames_do_not_collide() {
        let id = ObjectId::new();
        assert_ne!(user_photo_filename(&id), user_photo_filename(&id));
    }

    #[tokio::test]
    async fn test_store_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();

        store(base, USER_IMAGE_DIR, "user-test.jpeg", b"bytes")
            .await
            .unwrap();
        let written = base.join(USER_IMAGE_DIR).join("user-test.jpeg");
        assert_eq!(tokio::fs::read(&written).await.unwrap(), b"bytes");

        remove_stale(base, USER_IMAGE_DIR, "user-test.jpeg").await;
        assert!(!written.exists());

        // Missing files and the default photo are quietly ignored.
        remove_stale(base, USER_IMAGE_DIR, "user-test.jpeg").await;
        remove_stale(base, USER_IMAGE_DIR, DEFAULT_USER_PHOTO).await;
    }
}
