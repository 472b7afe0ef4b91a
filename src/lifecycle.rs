//! Asset lifecycle: sequences blob uploads/deletes around submission row
//! mutations so the record and the asset store never diverge.
//!
//! Ordering invariant: a blob referenced by a committed row is never deleted
//! before the row stops referencing it. An interrupted operation may leave an
//! orphaned blob (non-corrupting); it must never leave a row pointing at a
//! deleted blob.

use std::sync::Arc;

use log::warn;
use uuid::Uuid;

use crate::models::{Id, NewSubmission, Submission, UpdateSubmission, UserId};
use crate::repo::{RepoError, SubmissionRepo};
use crate::storage::{
    is_placeholder_url, AssetStore, AssetStoreError, ASSET_PREFIX, PLACEHOLDER_IMAGE_URL,
};

/// Raw image bytes plus the file extension from the original filename.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub ext: String,
}

/// What an edit does to the submission's image.
#[derive(Debug, Clone)]
pub enum ImageChange {
    Keep,
    Replace(ImagePayload),
    Remove,
}

#[derive(Debug, Clone)]
pub struct SubmissionFields {
    pub title: String,
    pub description: String,
}

/// Partial field update for an edit; None leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SubmissionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("asset upload failed: {0}")]
    Upload(AssetStoreError),
}

pub struct AssetLifecycle {
    store: Arc<dyn AssetStore>,
}

impl AssetLifecycle {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self { store }
    }

    fn fresh_path(ext: &str) -> String {
        format!("{}/{}.{}", ASSET_PREFIX, Uuid::new_v4(), ext)
    }

    /// Best-effort blob removal. Placeholder URLs are shared assets and are
    /// never deleted; cleanup failure is a warning, never a hard error.
    async fn delete_by_url(&self, url: &str) {
        if is_placeholder_url(url) {
            return;
        }
        let Some(path) = self.store.path_from_url(url) else {
            warn!("cannot derive asset path from url '{url}', skipping delete");
            return;
        };
        if let Err(e) = self.store.delete(&path).await {
            warn!("asset cleanup failed for '{path}': {e} (orphaned blob)");
        }
    }

    /// Create with image: upload first, then insert the row referencing the
    /// URL. If the insert fails the fresh blob is removed best-effort; the
    /// insert error is what propagates. Without an image the row references
    /// the shared placeholder, as the submitter flow always has.
    pub async fn create_submission<R>(
        &self,
        repo: &R,
        business_id: Id,
        fields: SubmissionFields,
        submitted_by: &UserId,
        image: Option<ImagePayload>,
    ) -> Result<Submission, LifecycleError>
    where
        R: SubmissionRepo + ?Sized,
    {
        let uploaded_url = match image {
            Some(img) => {
                let path = Self::fresh_path(&img.ext);
                let url = self
                    .store
                    .upload(&path, &img.bytes)
                    .await
                    .map_err(LifecycleError::Upload)?;
                Some(url)
            }
            None => None,
        };

        let new = NewSubmission {
            business_id,
            title: fields.title,
            description: fields.description,
            image_url: uploaded_url
                .clone()
                .or_else(|| Some(PLACEHOLDER_IMAGE_URL.to_string())),
            submitted_by: submitted_by.clone(),
        };
        match repo.insert_submission(new).await {
            Ok(submission) => Ok(submission),
            Err(e) => {
                if let Some(url) = uploaded_url {
                    self.delete_by_url(&url).await;
                }
                Err(e.into())
            }
        }
    }

    /// Edit: the old blob is deleted only after the row update commits, so an
    /// interruption leaves an orphan rather than a dangling reference.
    pub async fn edit_submission<R>(
        &self,
        repo: &R,
        id: Id,
        actor: &UserId,
        fields: SubmissionPatch,
        image: ImageChange,
    ) -> Result<Submission, LifecycleError>
    where
        R: SubmissionRepo + ?Sized,
    {
        let current = repo.get_submission(id).await?;
        let old_url = current.image_url.clone();

        let (image_patch, uploaded_url) = match &image {
            ImageChange::Keep => (None, None),
            ImageChange::Remove => (Some(None), None),
            ImageChange::Replace(img) => {
                let path = Self::fresh_path(&img.ext);
                let url = self
                    .store
                    .upload(&path, &img.bytes)
                    .await
                    .map_err(LifecycleError::Upload)?;
                (Some(Some(url.clone())), Some(url))
            }
        };

        let upd = UpdateSubmission {
            title: fields.title,
            description: fields.description,
            image_url: image_patch,
        };
        match repo.update_submission(id, actor, upd).await {
            Ok(updated) => {
                if !matches!(image, ImageChange::Keep) {
                    if let Some(old) = old_url {
                        self.delete_by_url(&old).await;
                    }
                }
                Ok(updated)
            }
            Err(e) => {
                // row untouched: the old blob stays referenced and intact,
                // the new one may be orphaned
                if let Some(url) = uploaded_url {
                    self.delete_by_url(&url).await;
                }
                Err(e.into())
            }
        }
    }

    /// Delete: row first (the store deletes atomically), blob second. A
    /// foreign-key rejection leaves both the row and the blob intact; a
    /// missing row counts as already resolved.
    pub async fn delete_submission<R>(
        &self,
        repo: &R,
        id: Id,
        actor: &UserId,
    ) -> Result<(), LifecycleError>
    where
        R: SubmissionRepo + ?Sized,
    {
        let image_url = match repo.get_submission(id).await {
            Ok(sub) => sub.image_url,
            Err(RepoError::NotFound) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        match repo.delete_submission(id, actor).await {
            Ok(()) | Err(RepoError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(url) = image_url {
            self.delete_by_url(&url).await;
        }
        Ok(())
    }
}
