use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeZone, Utc};

use media_vault::object_store::{LocalStore, ObjectStore, PutOptions, StoreError};
use media_vault::path;
use media_vault::txn::UploadItem;
use media_vault::validate::{
    validate, MediaCategory, ValidationError, MAX_AUDIO_BYTES, MAX_IMAGE_BYTES, MAX_VIDEO_BYTES,
};
use media_vault::vault::{Vault, VaultError};

fn test_vault(dir: &tempfile::TempDir) -> Vault {
    let store = LocalStore::new(dir.path(), "test-secret").unwrap();
    Vault::new(
        Arc::new(store) as Arc<dyn ObjectStore>,
        "media",
        Duration::from_secs(5),
    )
}

fn image_item(path: &str, content: &str) -> UploadItem {
    UploadItem {
        path: path.to_string(),
        content: Bytes::from(content.to_string()),
        options: PutOptions {
            content_type: Some("image/png".to_string()),
            ..Default::default()
        },
    }
}

// ============================================================================
// Validator
// ============================================================================

#[test]
fn test_validate_allows_media_types() {
    assert_eq!(validate("image/png", 100).unwrap(), MediaCategory::Image);
    assert_eq!(validate("video/mp4", 100).unwrap(), MediaCategory::Video);
    assert_eq!(validate("audio/mpeg", 100).unwrap(), MediaCategory::Audio);
}

#[test]
fn test_validate_rejects_unsupported_types() {
    for ct in ["application/pdf", "text/html", "application/octet-stream", ""] {
        assert!(matches!(
            validate(ct, 100),
            Err(ValidationError::UnsupportedType(_))
        ));
    }
}

#[test]
fn test_validate_boundary_exact_limit_passes() {
    assert!(validate("image/png", MAX_IMAGE_BYTES).is_ok());
    assert!(validate("video/mp4", MAX_VIDEO_BYTES).is_ok());
    assert!(validate("audio/mpeg", MAX_AUDIO_BYTES).is_ok());
}

#[test]
fn test_validate_boundary_one_over_fails() {
    for (ct, limit) in [
        ("image/png", MAX_IMAGE_BYTES),
        ("video/mp4", MAX_VIDEO_BYTES),
        ("audio/mpeg", MAX_AUDIO_BYTES),
    ] {
        match validate(ct, limit + 1) {
            Err(ValidationError::TooLarge { size, limit: l, .. }) => {
                assert_eq!(size, limit + 1);
                assert_eq!(l, limit);
            }
            other => panic!("expected TooLarge for {ct}, got {other:?}"),
        }
    }
}

// ============================================================================
// Path allocator
// ============================================================================

#[test]
fn test_allocate_at_shape() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let key = path::allocate_at("u1", MediaCategory::Image, "My Photo.PNG", at, "deadbeef");
    assert_eq!(
        key,
        format!("u1/image/my_photo-{}-deadbeef.png", at.timestamp_millis())
    );
}

#[test]
fn test_allocate_without_extension() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let key = path::allocate_at("u1", MediaCategory::Audio, "recording", at, "cafe");
    assert!(key.starts_with("u1/audio/recording-"));
    assert!(!key.contains('.'));
}

#[test]
fn test_allocate_unique_keys() {
    let a = path::allocate("u1", MediaCategory::Image, "photo.png");
    let b = path::allocate("u1", MediaCategory::Image, "photo.png");
    assert_ne!(a, b);
    assert!(a.starts_with("u1/image/"));
    assert!(b.starts_with("u1/image/"));
}

#[test]
fn test_is_owned_by_exact_segment() {
    assert!(path::is_owned_by("u1/image/a.png", "u1"));
    assert!(!path::is_owned_by("u1/image/a.png", "u2"));
    // A prefix of another owner's id must not pass.
    assert!(!path::is_owned_by("u12/image/a.png", "u1"));
    assert!(!path::is_owned_by("u1", "u1"));
    assert!(!path::is_owned_by("u1/", "u1"));
    assert!(!path::is_owned_by("u1/image/a.png", ""));
}

#[test]
fn test_prefix_owned_by() {
    assert!(path::prefix_owned_by("u1/raw", "u1"));
    assert!(path::prefix_owned_by("u1/raw/", "u1"));
    assert!(path::prefix_owned_by("u1", "u1"));
    assert!(!path::prefix_owned_by("u12/raw", "u1"));
    assert!(!path::prefix_owned_by("u2/raw", "u1"));
}

// ============================================================================
// Façade
// ============================================================================

#[tokio::test]
async fn test_vault_upload_and_download() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let object = vault
        .upload("u1", "photo.png", "image/png", Bytes::from("pixels"))
        .await
        .unwrap();
    assert!(object.path.starts_with("u1/image/"));
    assert_eq!(object.byte_size, 6);

    let data = vault.download("u1", &object.path).await.unwrap();
    assert_eq!(data, Bytes::from("pixels"));
}

#[tokio::test]
async fn test_vault_upload_rejects_unsupported_type() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let result = vault
        .upload("u1", "doc.pdf", "application/pdf", Bytes::from("%PDF"))
        .await;
    assert!(matches!(result, Err(VaultError::Validation { .. })));
}

#[tokio::test]
async fn test_vault_upload_batch_enforces_owner_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let items = vec![
        image_item("u1/image/a.png", "a"),
        image_item("u2/image/b.png", "b"),
    ];
    let result = vault.upload_batch("u1", items).await;

    match result {
        Err(VaultError::Forbidden(p)) => assert_eq!(p, "u2/image/b.png"),
        other => panic!("expected Forbidden, got {other:?}"),
    }
    // The check runs before any store call; nothing was written.
    let listed = vault
        .list("u1", "u1", media_vault::object_store::ListOptions::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_vault_upload_batch_commits() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let items = vec![
        image_item("u1/image/a.png", "a"),
        image_item("u1/image/b.png", "b"),
    ];
    let objects = vault.upload_batch("u1", items).await.unwrap();
    assert_eq!(objects.len(), 2);
}

#[tokio::test]
async fn test_vault_delete() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let object = vault
        .upload("u1", "photo.png", "image/png", Bytes::from("pixels"))
        .await
        .unwrap();

    vault.delete("u1", &object.path).await.unwrap();
    let result = vault.download("u1", &object.path).await;
    assert!(matches!(result, Err(VaultError::Store(StoreError::NotFound(_)))));
}

#[tokio::test]
async fn test_vault_delete_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let result = vault.delete("u1", "u1/image/missing.png").await;
    assert!(matches!(result, Err(VaultError::Store(StoreError::NotFound(_)))));
}

#[tokio::test]
async fn test_vault_delete_batch_reports_partition() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    vault
        .upload_batch("u1", vec![image_item("u1/image/a.png", "a")])
        .await
        .unwrap();

    let result = vault
        .delete_batch(
            "u1",
            vec!["u1/image/a.png".to_string(), "u1/image/missing.png".to_string()],
        )
        .await;

    match result {
        Err(VaultError::PartialFailure { succeeded, failed }) => {
            assert_eq!(succeeded, vec!["u1/image/a.png"]);
            assert_eq!(failed, vec!["u1/image/missing.png"]);
        }
        other => panic!("expected PartialFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_vault_delete_batch_full_success() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    vault
        .upload_batch(
            "u1",
            vec![image_item("u1/image/a.png", "a"), image_item("u1/image/b.png", "b")],
        )
        .await
        .unwrap();

    let report = vault
        .delete_batch(
            "u1",
            vec!["u1/image/a.png".to_string(), "u1/image/b.png".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(report.succeeded.len(), 2);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_vault_move_folder() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    vault
        .upload_batch(
            "u1",
            vec![image_item("u1/raw/a.png", "a"), image_item("u1/raw/b.png", "b")],
        )
        .await
        .unwrap();

    let moved = vault.move_folder("u1", "u1/raw", "u1/archive").await.unwrap();
    assert_eq!(moved.len(), 2);

    let source = vault
        .list("u1", "u1/raw", media_vault::object_store::ListOptions::default())
        .await
        .unwrap();
    assert!(source.is_empty());

    let dest = vault
        .list("u1", "u1/archive", media_vault::object_store::ListOptions::default())
        .await
        .unwrap();
    assert_eq!(dest.len(), 2);
}

#[tokio::test]
async fn test_vault_move_folder_forbidden_destination() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let result = vault.move_folder("u1", "u1/raw", "u2/stolen").await;
    assert!(matches!(result, Err(VaultError::Forbidden(_))));
}

#[tokio::test]
async fn test_vault_copy_folder() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    vault
        .upload_batch("u1", vec![image_item("u1/raw/a.png", "a")])
        .await
        .unwrap();

    let copied = vault.copy_folder("u1", "u1/raw", "u1/backup").await.unwrap();
    assert_eq!(copied.len(), 1);
    assert_eq!(copied[0].path, "u1/backup/a.png");

    // Source untouched
    let data = vault.download("u1", "u1/raw/a.png").await.unwrap();
    assert_eq!(data, Bytes::from("a"));
    let copy = vault.download("u1", "u1/backup/a.png").await.unwrap();
    assert_eq!(copy, Bytes::from("a"));
}

#[tokio::test]
async fn test_vault_replace_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let object = vault
        .upload("u1", "photo.png", "image/png", Bytes::from("old"))
        .await
        .unwrap();

    let replaced = vault
        .replace("u1", &object.path, "image/png", Bytes::from("new"))
        .await
        .unwrap();
    assert_eq!(replaced.path, object.path);

    let data = vault.download("u1", &object.path).await.unwrap();
    assert_eq!(data, Bytes::from("new"));
}

#[tokio::test]
async fn test_vault_replace_validates_content() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let result = vault
        .replace("u1", "u1/image/a.png", "application/zip", Bytes::from("zip"))
        .await;
    assert!(matches!(result, Err(VaultError::Validation { .. })));
}

#[tokio::test]
async fn test_vault_signed_url_owner_scoped() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let object = vault
        .upload("u1", "clip.mp3", "audio/mpeg", Bytes::from("audio"))
        .await
        .unwrap();

    let url = vault.signed_url("u1", &object.path, 600).await.unwrap();
    assert!(url.contains(&object.path));

    let other = vault.signed_url("u2", &object.path, 600).await;
    assert!(matches!(other, Err(VaultError::Forbidden(_))));
}

#[tokio::test]
async fn test_vault_list_scopes_to_owner_segment() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalStore::new(dir.path(), "test-secret").unwrap());
    let vault = Vault::new(
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        "media",
        Duration::from_secs(5),
    );

    // Another owner whose id shares u1 as a string prefix.
    store
        .put(
            "media",
            "u12/image/secret.png",
            Bytes::from("x"),
            PutOptions::default(),
        )
        .await
        .unwrap();
    store
        .put(
            "media",
            "u1/image/mine.png",
            Bytes::from("y"),
            PutOptions::default(),
        )
        .await
        .unwrap();

    let listed = vault
        .list("u1", "u1", media_vault::object_store::ListOptions::default())
        .await
        .unwrap();
    let paths: Vec<&str> = listed.iter().map(|o| o.path.as_str()).collect();
    assert_eq!(paths, vec!["u1/image/mine.png"]);
}

#[tokio::test]
async fn test_vault_list_forbidden_for_foreign_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let vault = test_vault(&dir);

    let result = vault
        .list("u1", "u2", media_vault::object_store::ListOptions::default())
        .await;
    assert!(matches!(result, Err(VaultError::Forbidden(_))));
}
