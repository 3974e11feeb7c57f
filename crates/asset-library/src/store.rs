//! Asset persistence seam
//!
//! [`AssetStore`] is implemented by the PostgreSQL store in `asset-db` and
//! by [`MemoryAssetStore`] for tests and database-less runs.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use asset_core::{Id, Record};
use tokio::sync::RwLock;

use crate::condition::MimeCondition;
use crate::error::{AssetError, AssetResult};
use crate::model::{Asset, PageAttachment};

/// Search filter with paging window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetQuery {
    /// Case-insensitive substring of file name, title or caption
    pub term: Option<String>,
    pub condition: Option<MimeCondition>,
    pub limit: i64,
    pub offset: i64,
}

impl AssetQuery {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit,
            offset,
            ..Default::default()
        }
    }

    /// Blank terms are dropped, others are kept as given
    pub fn term(mut self, term: impl AsRef<str>) -> Self {
        let term = term.as_ref();
        self.term = if term.trim().is_empty() {
            None
        } else {
            Some(term.to_lowercase())
        };
        self
    }

    pub fn condition(mut self, condition: Option<MimeCondition>) -> Self {
        self.condition = condition;
        self
    }

    /// Filter evaluation for stores without a query language
    pub fn matches(&self, asset: &Asset) -> bool {
        if let Some(condition) = &self.condition {
            if !condition.matches(asset.content_type.as_deref()) {
                return false;
            }
        }

        match &self.term {
            None => true,
            Some(term) => [&asset.file_name, &asset.title, &asset.caption]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(term.as_str())),
        }
    }
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Insert an asset, assigning its id
    async fn create(&self, asset: &mut Asset) -> AssetResult<Id>;

    async fn get(&self, id: Id) -> AssetResult<Option<Asset>>;

    /// Fails with `NotFound` when no record has the asset's id
    async fn update(&self, asset: &Asset) -> AssetResult<()>;

    /// Delete an asset together with its page attachments
    async fn delete(&self, id: Id) -> AssetResult<()>;

    /// Matching assets, newest first, and the total number of matches
    async fn search(&self, query: &AssetQuery) -> AssetResult<(Vec<Asset>, i64)>;

    /// Link an asset to a page; an existing link is returned unchanged
    async fn attach(&self, attachment: &mut PageAttachment) -> AssetResult<Id>;

    /// Returns whether a link was removed
    async fn detach(&self, asset_id: Id, page_id: Id) -> AssetResult<bool>;

    async fn attachments_for_asset(&self, asset_id: Id) -> AssetResult<Vec<PageAttachment>>;

    /// Links of a page ordered by position
    async fn attachments_for_page(&self, page_id: Id) -> AssetResult<Vec<PageAttachment>>;
}

/// In-memory asset store for testing
pub struct MemoryAssetStore {
    assets: RwLock<Vec<Asset>>,
    attachments: RwLock<Vec<PageAttachment>>,
    next_id: AtomicI64,
    next_attachment_id: AtomicI64,
}

impl Default for MemoryAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self {
            assets: RwLock::new(Vec::new()),
            attachments: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            next_attachment_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn create(&self, asset: &mut Asset) -> AssetResult<Id> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        asset.id = Some(id);

        let mut assets = self.assets.write().await;
        assets.push(asset.clone());

        Ok(id)
    }

    async fn get(&self, id: Id) -> AssetResult<Option<Asset>> {
        let assets = self.assets.read().await;
        Ok(assets.iter().find(|a| a.id == Some(id)).cloned())
    }

    async fn update(&self, asset: &Asset) -> AssetResult<()> {
        let id = asset.id().ok_or(AssetError::NotFound(0))?;
        let mut assets = self.assets.write().await;
        match assets.iter().position(|a| a.is_persisted() && a.id == Some(id)) {
            Some(pos) => {
                assets[pos] = asset.clone();
                Ok(())
            }
            None => Err(AssetError::NotFound(id)),
        }
    }

    async fn delete(&self, id: Id) -> AssetResult<()> {
        self.attachments
            .write()
            .await
            .retain(|a| a.asset_id != id);
        self.assets.write().await.retain(|a| a.id != Some(id));
        Ok(())
    }

    async fn search(&self, query: &AssetQuery) -> AssetResult<(Vec<Asset>, i64)> {
        let assets = self.assets.read().await;
        let mut matching: Vec<&Asset> = assets.iter().filter(|a| query.matches(a)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(0))
            .take(usize::try_from(query.limit).unwrap_or(0))
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn attach(&self, attachment: &mut PageAttachment) -> AssetResult<Id> {
        let mut attachments = self.attachments.write().await;

        if let Some(existing) = attachments
            .iter()
            .find(|a| a.asset_id == attachment.asset_id && a.page_id == attachment.page_id)
        {
            *attachment = existing.clone();
            return Ok(existing.id.unwrap_or_default());
        }

        let id = self.next_attachment_id.fetch_add(1, Ordering::SeqCst);
        attachment.id = Some(id);
        attachments.push(attachment.clone());
        Ok(id)
    }

    async fn detach(&self, asset_id: Id, page_id: Id) -> AssetResult<bool> {
        let mut attachments = self.attachments.write().await;
        let before = attachments.len();
        attachments.retain(|a| !(a.asset_id == asset_id && a.page_id == page_id));
        Ok(attachments.len() != before)
    }

    async fn attachments_for_asset(&self, asset_id: Id) -> AssetResult<Vec<PageAttachment>> {
        let attachments = self.attachments.read().await;
        Ok(attachments
            .iter()
            .filter(|a| a.asset_id == asset_id)
            .cloned()
            .collect())
    }

    async fn attachments_for_page(&self, page_id: Id) -> AssetResult<Vec<PageAttachment>> {
        let attachments = self.attachments.read().await;
        let mut found: Vec<PageAttachment> = attachments
            .iter()
            .filter(|a| a.page_id == page_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.position, a.id));
        Ok(found)
    }
}
