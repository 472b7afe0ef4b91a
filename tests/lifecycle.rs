#![cfg(feature = "inmem-store")]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use votely::lifecycle::{AssetLifecycle, ImageChange, ImagePayload, LifecycleError, SubmissionFields, SubmissionPatch};
use votely::models::{NewBusiness, NewSubmission};
use votely::repo::inmem::InMemRepo;
use votely::repo::{BusinessRepo, RepoError, SubmissionRepo, VoteRepo};
use votely::storage::{AssetStore, AssetStoreError, PLACEHOLDER_IMAGE_URL};

/// Recording in-memory store: remembers every upload and delete so the
/// ordering invariants can be asserted, and can be told to fail uploads.
#[derive(Default)]
struct MockStore {
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_uploads: bool,
}

impl MockStore {
    fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
    fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for MockStore {
    async fn upload(&self, path: &str, _bytes: &[u8]) -> Result<String, AssetStoreError> {
        if self.fail_uploads {
            return Err(AssetStoreError::Other("upload refused".into()));
        }
        self.uploads.lock().unwrap().push(path.to_string());
        Ok(self.public_url(path))
    }
    async fn delete(&self, path: &str) -> Result<(), AssetStoreError> {
        self.deletes.lock().unwrap().push(path.to_string());
        Ok(())
    }
    fn public_url(&self, path: &str) -> String {
        format!("http://assets.local/{path}")
    }
}

fn repo() -> InMemRepo {
    std::env::set_var("VOTELY_DATA_DIR", tempfile::tempdir().unwrap().path());
    InMemRepo::new()
}

async fn seed_business(r: &InMemRepo) -> i64 {
    r.create_business(
        &"owner".into(),
        NewBusiness {
            name: "Biz".into(),
            tagline: None,
        },
    )
    .await
    .unwrap()
    .id
}

fn png_payload() -> ImagePayload {
    ImagePayload {
        bytes: vec![0x89, b'P', b'N', b'G'],
        ext: "png".into(),
    }
}

fn fields(title: &str) -> SubmissionFields {
    SubmissionFields {
        title: title.into(),
        description: "desc".into(),
    }
}

#[tokio::test]
async fn create_with_image_uploads_then_inserts() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("With image"), &"u".into(), Some(png_payload()))
        .await
        .unwrap();

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].starts_with("product-images/"));
    assert_eq!(s.image_url.as_deref(), Some(store.public_url(&uploads[0]).as_str()));
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn create_without_image_references_placeholder() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("No image"), &"u".into(), None)
        .await
        .unwrap();

    assert_eq!(s.image_url.as_deref(), Some(PLACEHOLDER_IMAGE_URL));
    assert!(store.uploads().is_empty());
}

#[tokio::test]
async fn failed_insert_cleans_up_fresh_blob() {
    let r = repo();
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    // business 9999 does not exist, so the insert fails after the upload
    let err = lc
        .create_submission(&r, 9999, fields("Orphan"), &"u".into(), Some(png_payload()))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Repo(RepoError::NotFound)));

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(store.deletes(), uploads);
}

#[tokio::test]
async fn replace_deletes_old_blob_only_after_row_commit() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("A"), &"u".into(), Some(png_payload()))
        .await
        .unwrap();
    let old_path = store.uploads()[0].clone();

    let updated = lc
        .edit_submission(
            &r,
            s.id,
            &"u".into(),
            SubmissionPatch::default(),
            ImageChange::Replace(png_payload()),
        )
        .await
        .unwrap();

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 2);
    let new_path = uploads[1].clone();
    // exactly one referenced blob; the old one was deleted, the new one kept
    assert_eq!(updated.image_url.as_deref(), Some(store.public_url(&new_path).as_str()));
    assert_eq!(store.deletes(), vec![old_path]);
}

#[tokio::test]
async fn failed_row_update_keeps_old_blob_and_drops_new() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("A"), &"u".into(), Some(png_payload()))
        .await
        .unwrap();
    let old_url = s.image_url.clone().unwrap();
    let old_path = store.uploads()[0].clone();

    // an intruder may not edit; the row update is rejected after the upload
    let err = lc
        .edit_submission(
            &r,
            s.id,
            &"intruder".into(),
            SubmissionPatch::default(),
            ImageChange::Replace(png_payload()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Repo(RepoError::Unauthorized)));

    // row untouched, old blob never deleted, the orphaned new one removed
    let current = r.get_submission(s.id).await.unwrap();
    assert_eq!(current.image_url.as_deref(), Some(old_url.as_str()));
    let deletes = store.deletes();
    assert_eq!(deletes.len(), 1);
    assert_ne!(deletes[0], old_path);
}

#[tokio::test]
async fn remove_image_nulls_row_then_deletes_blob() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("A"), &"u".into(), Some(png_payload()))
        .await
        .unwrap();
    let old_path = store.uploads()[0].clone();

    let updated = lc
        .edit_submission(
            &r,
            s.id,
            &"u".into(),
            SubmissionPatch::default(),
            ImageChange::Remove,
        )
        .await
        .unwrap();
    assert_eq!(updated.image_url, None);
    assert_eq!(store.deletes(), vec![old_path]);
}

#[tokio::test]
async fn keep_image_touches_nothing() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("A"), &"u".into(), Some(png_payload()))
        .await
        .unwrap();
    let url = s.image_url.clone();

    let updated = lc
        .edit_submission(
            &r,
            s.id,
            &"u".into(),
            SubmissionPatch {
                title: Some("Renamed".into()),
                description: None,
            },
            ImageChange::Keep,
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.image_url, url);
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn delete_removes_row_first_then_blob() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("A"), &"u".into(), Some(png_payload()))
        .await
        .unwrap();
    let path = store.uploads()[0].clone();

    lc.delete_submission(&r, s.id, &"u".into()).await.unwrap();
    assert!(matches!(
        r.get_submission(s.id).await.unwrap_err(),
        RepoError::NotFound
    ));
    assert_eq!(store.deletes(), vec![path]);

    // repeating the delete is already-resolved success
    lc.delete_submission(&r, s.id, &"u".into()).await.unwrap();
}

#[tokio::test]
async fn fk_rejected_delete_leaves_row_and_blob_intact() {
    std::env::set_var("VOTELY_DATA_DIR", tempfile::tempdir().unwrap().path());
    let r = InMemRepo::new().with_cascade(false);
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("A"), &"u".into(), Some(png_payload()))
        .await
        .unwrap();
    r.insert_vote(s.id, &"alice".into()).await.unwrap();

    let err = lc.delete_submission(&r, s.id, &"u".into()).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Repo(RepoError::ReferentialIntegrity)
    ));
    assert!(r.get_submission(s.id).await.is_ok());
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn placeholder_is_never_deleted() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore::default());
    let lc = AssetLifecycle::new(store.clone());

    let s = lc
        .create_submission(&r, bid, fields("No image"), &"u".into(), None)
        .await
        .unwrap();
    assert_eq!(s.image_url.as_deref(), Some(PLACEHOLDER_IMAGE_URL));

    lc.delete_submission(&r, s.id, &"u".into()).await.unwrap();
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn failed_upload_propagates_without_touching_the_row() {
    let r = repo();
    let bid = seed_business(&r).await;
    let store = Arc::new(MockStore {
        fail_uploads: true,
        ..Default::default()
    });
    let lc = AssetLifecycle::new(store.clone());

    let err = lc
        .create_submission(&r, bid, fields("A"), &"u".into(), Some(png_payload()))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Upload(_)));
    assert!(r.list_submissions(bid).await.unwrap().is_empty());
}
