//! Asset Service
//!
//! Orchestrates uploads, renditions, metadata edits, search and page
//! attachments over an [`AssetStore`] and a [`Storage`] backend.

use std::sync::Arc;

use asset_core::{Id, Page, PaginationParams, ValidationErrors};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::asset_type::AssetTypeRegistry;
use crate::classification::{thumbnail_icon, AssetView};
use crate::error::{AssetError, AssetResult};
use crate::geometry::Geometry;
use crate::model::{Asset, CreateAssetParams, PageAttachment, UpdateAssetParams};
use crate::paths::{AttachmentPaths, ORIGINAL_STYLE};
use crate::processing::{render_styles, ImageEngine, ProcessingError, RasterEngine};
use crate::settings::AssetSettings;
use crate::storage::Storage;
use crate::store::{AssetQuery, AssetStore};

/// Page size of [`AssetService::search`]
pub const SEARCH_PER_PAGE: i64 = 10;

pub const MISSING_FILE_MESSAGE: &str = "You must choose a file to upload!";

/// Where a stored file lives, for the file-serving endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFile {
    pub key: String,
    /// Backend location, e.g. a filesystem path
    pub path: String,
    pub url: String,
    /// Set when the backend serves the file itself
    pub public_url: Option<String>,
    pub content_type: String,
    pub file_name: String,
    pub size: Option<i64>,
}

/// Asset service
pub struct AssetService<St: AssetStore + ?Sized, S: Storage + ?Sized> {
    registry: Arc<AssetTypeRegistry>,
    store: Arc<St>,
    storage: Arc<S>,
    engine: Arc<dyn ImageEngine>,
    settings: Arc<AssetSettings>,
    paths: AttachmentPaths,
}

impl<St: AssetStore + ?Sized, S: Storage + ?Sized> AssetService<St, S> {
    pub fn new(
        registry: Arc<AssetTypeRegistry>,
        store: Arc<St>,
        storage: Arc<S>,
        settings: AssetSettings,
        paths: AttachmentPaths,
    ) -> Self {
        Self {
            registry,
            store,
            storage,
            engine: Arc::new(RasterEngine::new()),
            settings: Arc::new(settings),
            paths,
        }
    }

    /// Replace the image engine
    pub fn with_engine(mut self, engine: Arc<dyn ImageEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn registry(&self) -> &AssetTypeRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &AssetSettings {
        &self.settings
    }

    pub fn paths(&self) -> &AttachmentPaths {
        &self.paths
    }

    pub fn storage_name(&self) -> &str {
        self.storage.name()
    }

    /// Classification and geometry queries for `asset`
    pub fn view<'a>(&'a self, asset: &'a Asset) -> AssetView<'a> {
        AssetView::new(asset, &self.registry, &self.settings.thumbnails)
    }

    /// Boundary checks for an upload: presence, content type and size
    pub fn validate(
        &self,
        file_name: Option<&str>,
        content_type: &str,
        size: u64,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if file_name.map_or(true, |name| name.trim().is_empty()) {
            errors.add_base(MISSING_FILE_MESSAGE);
            return errors.into_result();
        }

        if !self.settings.is_content_type_allowed(content_type) {
            errors.add("asset_content_type", "is not one of the allowed file types");
        }

        if let (Some(max_bytes), Some(max_mb)) = (
            self.settings.max_asset_size_bytes(),
            self.settings.max_asset_size_mb,
        ) {
            if size >= max_bytes {
                errors.add(
                    "asset_file_size",
                    format!("must be less than {} MB", max_mb),
                );
            }
        }

        errors.into_result()
    }

    fn resolve_content_type(params: &CreateAssetParams) -> String {
        params
            .content_type
            .clone()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(params.file_name.as_deref().unwrap_or_default())
                    .first_or_octet_stream()
                    .to_string()
            })
    }

    /// Create an asset from uploaded data
    #[instrument(skip(self, params, data), fields(file_name = ?params.file_name))]
    pub async fn upload(
        &self,
        params: CreateAssetParams,
        data: Bytes,
        user_id: Option<Id>,
    ) -> AssetResult<Asset> {
        let content_type = Self::resolve_content_type(&params);
        self.validate(params.file_name.as_deref(), &content_type, data.len() as u64)?;

        let mut asset = Asset::new(
            params.file_name.unwrap_or_default(),
            content_type,
            data.len() as i64,
        );
        asset.title = params.title;
        asset.caption = params.caption;
        asset.created_by_id = user_id;
        asset.updated_by_id = user_id;

        self.note_dimensions(&mut asset, &data).await;
        asset.assign_title();

        let id = self.store.create(&mut asset).await?;

        if let Err(e) = self.write_files(&asset, &data).await {
            warn!(id = id, error = %e, "Storing upload failed, removing record");
            self.discard_keys(&self.stored_keys(&asset)).await;
            if let Err(cleanup) = self.store.delete(id).await {
                warn!(id = id, error = %cleanup, "Failed to remove record of failed upload");
            }
            return Err(e);
        }

        info!(
            id = id,
            content_type = ?asset.content_type,
            storage = self.storage.name(),
            "Asset uploaded"
        );

        Ok(asset)
    }

    /// Replace the stored file of an existing asset
    #[instrument(skip(self, params, data), fields(file_name = ?params.file_name))]
    pub async fn replace_file(
        &self,
        id: Id,
        params: CreateAssetParams,
        data: Bytes,
        user_id: Option<Id>,
    ) -> AssetResult<Asset> {
        let previous = self.find(id).await?;

        let content_type = Self::resolve_content_type(&params);
        self.validate(params.file_name.as_deref(), &content_type, data.len() as u64)?;

        let mut asset = previous.clone();
        asset.file_name = params.file_name;
        asset.content_type = Some(content_type);
        asset.file_size = Some(data.len() as i64);
        asset.file_updated_at = Some(Utc::now());
        if params.title.is_some() {
            asset.title = params.title;
        }
        if params.caption.is_some() {
            asset.caption = params.caption;
        }

        asset.clear_dimensions();
        self.note_dimensions(&mut asset, &data).await;
        asset.assign_title();
        asset.touch(user_id);

        // New files land before the record moves; old ones go only after it has.
        let old_keys = self.stored_keys(&previous);
        let new_keys = self.stored_keys(&asset);
        let added: Vec<String> = new_keys
            .iter()
            .filter(|key| !old_keys.contains(key))
            .cloned()
            .collect();

        if let Err(e) = self.write_files(&asset, &data).await {
            warn!(id = id, error = %e, "Storing replacement failed, keeping previous file");
            self.discard_keys(&added).await;
            return Err(e);
        }

        if let Err(e) = self.store.update(&asset).await {
            warn!(id = id, error = %e, "Updating record failed, keeping previous file");
            self.discard_keys(&added).await;
            return Err(e);
        }

        let stale: Vec<String> = old_keys
            .into_iter()
            .filter(|key| !new_keys.contains(key))
            .collect();
        self.discard_keys(&stale).await;

        info!(id = id, content_type = ?asset.content_type, "Asset file replaced");

        Ok(asset)
    }

    /// Edit title and caption; a blank title falls back to the base name
    #[instrument(skip(self, params))]
    pub async fn update_metadata(
        &self,
        id: Id,
        params: UpdateAssetParams,
        user_id: Option<Id>,
    ) -> AssetResult<Asset> {
        let mut asset = self.find(id).await?;

        if let Some(title) = params.title {
            asset.title = Some(title);
        }
        if let Some(caption) = params.caption {
            asset.caption = Some(caption);
        }
        asset.assign_title();
        asset.touch(user_id);

        self.store.update(&asset).await?;
        debug!(id = id, "Asset metadata updated");

        Ok(asset)
    }

    /// Delete an asset, its stored files and its page attachments
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Id) -> AssetResult<()> {
        let asset = self.find(id).await?;

        self.remove_files(&asset).await?;
        self.store.delete(id).await?;

        info!(id = id, file_name = ?asset.file_name, "Asset deleted");

        Ok(())
    }

    pub async fn get(&self, id: Id) -> AssetResult<Option<Asset>> {
        self.store.get(id).await
    }

    pub async fn find(&self, id: Id) -> AssetResult<Asset> {
        self.store.get(id).await?.ok_or(AssetError::NotFound(id))
    }

    /// Search with the fixed page size of the asset browser
    pub async fn search<T: AsRef<str>>(
        &self,
        term: &str,
        type_filter: &[T],
        page: i64,
    ) -> AssetResult<Page<Asset>> {
        self.search_paginated(term, type_filter, PaginationParams::new(page, SEARCH_PER_PAGE))
            .await
    }

    /// Assets whose file name, title or caption contains `term`, restricted
    /// to the named types when `type_filter` is not empty. Newest first.
    #[instrument(skip(self, type_filter))]
    pub async fn search_paginated<T: AsRef<str>>(
        &self,
        term: &str,
        type_filter: &[T],
        params: PaginationParams,
    ) -> AssetResult<Page<Asset>> {
        let condition = if type_filter.is_empty() {
            None
        } else {
            Some(self.registry.condition_for(type_filter)?)
        };

        let query = AssetQuery::new(params.limit(), params.offset())
            .term(term)
            .condition(condition);

        let (items, total) = self.store.search(&query).await?;
        debug!(total = total, returned = items.len(), "Asset search");

        Ok(Page::new(items, params, total))
    }

    /// Output format of `style` for this asset's type
    fn style_format(&self, asset: &Asset, style: &str) -> Option<String> {
        if style == ORIGINAL_STYLE {
            return None;
        }
        self.view(asset)
            .asset_type()?
            .style_format(style, &self.settings.thumbnails)
    }

    /// URL of a stored style, from the backend when it serves files itself
    pub fn style_url(&self, asset: &Asset, style: &str) -> String {
        let format = self.style_format(asset, style);
        let key = self.paths.key(asset, style, format.as_deref());
        self.storage
            .public_url(&key)
            .unwrap_or_else(|| self.paths.url(asset, style, format.as_deref()))
    }

    /// Thumbnail for `size`: the file itself for `original`, a static icon for
    /// non-image categories, otherwise the rendition URL.
    pub fn thumbnail_url(&self, asset: &Asset, size: &str) -> String {
        if size == ORIGINAL_STYLE {
            return self.style_url(asset, ORIGINAL_STYLE);
        }
        thumbnail_icon(&self.view(asset), size).unwrap_or_else(|| self.style_url(asset, size))
    }

    /// Storage location of a style of an asset
    pub async fn locate_file(&self, id: Id, style: &str) -> AssetResult<LocatedFile> {
        let asset = self.find(id).await?;
        let file_name = asset.file_name.clone().ok_or(AssetError::NotFound(id))?;

        let format = self.style_format(&asset, style);
        let key = self.paths.key(&asset, style, format.as_deref());

        let content_type = if style == ORIGINAL_STYLE {
            asset
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string())
        } else {
            mime_guess::from_path(&key)
                .first_or_octet_stream()
                .to_string()
        };

        Ok(LocatedFile {
            path: self.storage.path(&key),
            public_url: self.storage.public_url(&key),
            url: self.style_url(&asset, style),
            size: if style == ORIGINAL_STYLE {
                asset.file_size
            } else {
                None
            },
            key,
            content_type,
            file_name,
        })
    }

    pub async fn read_file(&self, file: &LocatedFile) -> AssetResult<Bytes> {
        Ok(self.storage.get(&file.key).await?)
    }

    /// True dimensions of the stored original; zero when it is not an image
    #[instrument(skip(self, asset), fields(id = ?asset.id))]
    pub async fn geometry_from_file(&self, asset: &Asset) -> AssetResult<Geometry> {
        let key = self.paths.key(asset, ORIGINAL_STYLE, None);
        let data = self.storage.get(&key).await?;
        self.identify(data).await
    }

    async fn identify(&self, data: Bytes) -> AssetResult<Geometry> {
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || engine.identify(&data))
            .await
            .map_err(|e| AssetError::Task(e.to_string()))?;

        match result {
            Ok(geometry) => Ok(geometry),
            Err(ProcessingError::NotIdentified) => Ok(Geometry::ZERO),
            Err(e) => Err(e.into()),
        }
    }

    /// Capture original dimensions of an image. Failures leave them unset.
    async fn note_dimensions(&self, asset: &mut Asset, data: &Bytes) {
        if !self.view(asset).is_image() {
            return;
        }

        match self.identify(data.clone()).await {
            Ok(geometry) => {
                asset.original_width = Some(geometry.width);
                asset.original_height = Some(geometry.height);
                asset.original_extension = asset.extension();
            }
            Err(e) => {
                warn!(file_name = ?asset.file_name, error = %e, "Could not read image dimensions");
            }
        }
    }

    /// Store the original and every rendition of its type
    async fn write_files(&self, asset: &Asset, data: &Bytes) -> AssetResult<()> {
        let key = self.paths.key(asset, ORIGINAL_STYLE, None);
        self.storage.put(&key, data.clone()).await?;

        let Some(asset_type) = self.view(asset).asset_type() else {
            return Ok(());
        };
        let styles = asset_type.styles_with(&self.settings.thumbnails);
        if styles.is_empty() {
            return Ok(());
        }

        let engine = Arc::clone(&self.engine);
        let processors = asset_type.processors.clone();
        let source = data.clone();
        let extension = asset.extension().unwrap_or_default();
        let renditions = tokio::task::spawn_blocking(move || {
            render_styles(engine.as_ref(), &source, &processors, &styles, &extension)
        })
        .await
        .map_err(|e| AssetError::Task(e.to_string()))?;

        for (style, result) in renditions {
            match result {
                Ok(rendition) => {
                    let key = self.paths.key(asset, &style, Some(&rendition.extension));
                    self.storage.put(&key, rendition.data).await?;
                }
                Err(e) => {
                    warn!(id = ?asset.id, style = %style, error = %e, "Rendition skipped");
                }
            }
        }

        Ok(())
    }

    /// Keys of the original and every rendition the asset's type declares
    fn stored_keys(&self, asset: &Asset) -> Vec<String> {
        if !asset.has_file() {
            return Vec::new();
        }

        let mut keys = vec![self.paths.key(asset, ORIGINAL_STYLE, None)];
        for style in self.view(asset).style_names() {
            let format = self.style_format(asset, &style);
            keys.push(self.paths.key(asset, &style, format.as_deref()));
        }
        keys
    }

    async fn remove_files(&self, asset: &Asset) -> AssetResult<()> {
        for key in self.stored_keys(asset) {
            self.storage.delete(&key).await?;
        }
        Ok(())
    }

    /// Best-effort removal; failures are logged
    async fn discard_keys(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.storage.delete(key).await {
                warn!(key = %key, error = %e, "Failed to remove stored file");
            }
        }
    }

    /// Attach an asset to a page at the next free position
    #[instrument(skip(self))]
    pub async fn attach_to_page(
        &self,
        asset_id: Id,
        page_id: Id,
        user_id: Option<Id>,
    ) -> AssetResult<PageAttachment> {
        self.find(asset_id).await?;

        let position = self
            .store
            .attachments_for_page(page_id)
            .await?
            .iter()
            .map(|a| a.position)
            .max()
            .unwrap_or(0)
            + 1;

        let mut attachment = PageAttachment::new(asset_id, page_id, position).created_by(user_id);
        self.store.attach(&mut attachment).await?;

        info!(asset_id = asset_id, page_id = page_id, position = attachment.position, "Asset attached to page");

        Ok(attachment)
    }

    #[instrument(skip(self))]
    pub async fn detach_from_page(&self, asset_id: Id, page_id: Id) -> AssetResult<()> {
        if self.store.detach(asset_id, page_id).await? {
            info!(asset_id = asset_id, page_id = page_id, "Asset detached from page");
            Ok(())
        } else {
            Err(AssetError::AttachmentNotFound { asset_id, page_id })
        }
    }

    /// Assets attached to a page, in position order
    pub async fn attachments_for_page(&self, page_id: Id) -> AssetResult<Vec<Asset>> {
        let mut assets = Vec::new();
        for attachment in self.store.attachments_for_page(page_id).await? {
            match self.store.get(attachment.asset_id).await? {
                Some(asset) => assets.push(asset),
                None => warn!(asset_id = attachment.asset_id, page_id = page_id, "Dangling page attachment"),
            }
        }
        Ok(assets)
    }

    pub async fn pages_for_asset(&self, asset_id: Id) -> AssetResult<Vec<Id>> {
        let mut pages: Vec<Id> = self
            .store
            .attachments_for_asset(asset_id)
            .await?
            .into_iter()
            .map(|a| a.page_id)
            .collect();
        pages.sort_unstable();
        pages.dedup();
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::standard_registry;
    use crate::processing::fixtures::png;
    use crate::processing::MockImageEngine;
    use crate::settings::{DEFAULT_PATH_TEMPLATE, DEFAULT_URL_TEMPLATE};
    use crate::storage::{FileMetadata, MemoryStorage, StorageError, StorageResult};
    use crate::store::MemoryAssetStore;
    use asset_core::Settings;

    struct Fixture {
        service: AssetService<MemoryAssetStore, MemoryStorage>,
        storage: Arc<MemoryStorage>,
    }

    fn fixture_with(settings: Settings) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let service = AssetService::new(
            Arc::new(standard_registry()),
            Arc::new(MemoryAssetStore::new()),
            Arc::clone(&storage),
            AssetSettings::from_settings(&settings),
            AttachmentPaths::new(DEFAULT_URL_TEMPLATE, DEFAULT_PATH_TEMPLATE, "/srv/cms"),
        );
        Fixture { service, storage }
    }

    fn fixture() -> Fixture {
        fixture_with(Settings::new())
    }

    async fn upload(service: &AssetService<MemoryAssetStore, MemoryStorage>, name: &str, mime: &str) -> Asset {
        service
            .upload(
                CreateAssetParams::new(name).content_type(mime),
                Bytes::from_static(b"data"),
                Some(1),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_image_captures_dimensions() {
        let Fixture { service, storage } = fixture();

        let asset = service
            .upload(CreateAssetParams::new("Photo.PNG"), Bytes::from(png(800, 600)), Some(3))
            .await
            .unwrap();

        assert_eq!(asset.id, Some(1));
        assert_eq!(asset.content_type.as_deref(), Some("image/png"));
        assert_eq!(asset.title.as_deref(), Some("Photo"));
        assert_eq!(asset.original_extension.as_deref(), Some("png"));
        assert_eq!(asset.created_by_id, Some(3));

        let view = service.view(&asset);
        assert_eq!(view.geometry("original"), Some(Geometry::new(800, 600)));
        assert!(view.is_horizontal("original"));

        assert_eq!(
            storage.keys().await,
            vec![
                "public/assets/1/Photo.png".to_string(),
                "public/assets/1/Photo_icon.png".to_string(),
                "public/assets/1/Photo_thumbnail.png".to_string(),
            ]
        );
        let icon = storage.get("public/assets/1/Photo_icon.png").await.unwrap();
        assert_eq!(RasterEngine.identify(&icon).unwrap(), Geometry::new(42, 42));

        let stored = service.find(1).await.unwrap();
        assert_eq!(stored.original_width, Some(800));
        assert_eq!(
            service.geometry_from_file(&stored).await.unwrap(),
            Geometry::new(800, 600)
        );
    }

    #[tokio::test]
    async fn test_configured_thumbnails_are_rendered() {
        let Fixture { service, storage } =
            fixture_with(Settings::from_pairs([("assets.additional_thumbnails", "mini=50x50")]));

        service
            .upload(CreateAssetParams::new("cat.png"), Bytes::from(png(100, 100)), None)
            .await
            .unwrap();

        assert!(storage.exists("public/assets/1/cat_mini.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_unidentifiable_image_gets_zero_geometry() {
        let mut engine = MockImageEngine::new();
        engine
            .expect_identify()
            .returning(|_| Err(ProcessingError::NotIdentified));
        engine
            .expect_render()
            .returning(|_, _, _| Err(ProcessingError::NotIdentified));

        let Fixture { service, storage } = fixture();
        let service = service.with_engine(Arc::new(engine));

        let asset = upload(&service, "broken.png", "image/png").await;
        assert_eq!(asset.original_geometry(), Some(Geometry::ZERO));
        assert_eq!(
            service.geometry_from_file(&asset).await.unwrap(),
            Geometry::ZERO
        );
        assert_eq!(storage.keys().await, vec!["public/assets/1/broken.png".to_string()]);
    }

    #[tokio::test]
    async fn test_dimension_failure_does_not_block_save() {
        let mut engine = MockImageEngine::new();
        engine
            .expect_identify()
            .returning(|_| Err(ProcessingError::Failed("decoder crashed".into())));
        engine
            .expect_render()
            .returning(|_, _, _| Err(ProcessingError::Failed("decoder crashed".into())));

        let Fixture { service, .. } = fixture();
        let service = service.with_engine(Arc::new(engine));

        let asset = upload(&service, "odd.png", "image/png").await;
        assert!(asset.id.is_some());
        assert_eq!(asset.original_width, None);
        assert_eq!(asset.original_height, None);
    }

    #[tokio::test]
    async fn test_non_image_skips_engine() {
        let mut engine = MockImageEngine::new();
        engine.expect_identify().never();
        engine.expect_render().never();

        let Fixture { service, storage } = fixture();
        let service = service.with_engine(Arc::new(engine));

        let asset = upload(&service, "Report.pdf", "application/pdf").await;
        assert_eq!(asset.original_geometry(), None);
        assert_eq!(asset.title.as_deref(), Some("Report"));
        assert_eq!(storage.keys().await, vec!["public/assets/1/Report.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_validation() {
        let Fixture { service, .. } = fixture_with(Settings::from_pairs([
            ("assets.content_types", "image/png,application/pdf"),
            ("assets.max_asset_size", "1"),
        ]));

        let err = service
            .upload(CreateAssetParams::default(), Bytes::new(), None)
            .await
            .unwrap_err();
        match err {
            AssetError::Validation(errors) => {
                assert_eq!(errors.full_messages(), vec![MISSING_FILE_MESSAGE.to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = service
            .upload(CreateAssetParams::new("song.mp3"), Bytes::from_static(b"id3"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Validation(ref e) if e.has_error("asset_content_type")));

        let too_big = Bytes::from(vec![0u8; 1024 * 1024]);
        let err = service
            .upload(CreateAssetParams::new("big.pdf"), too_big, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Validation(ref e) if e.has_error("asset_file_size")));

        assert!(service.search("", &[] as &[&str], 1).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_thumbnail_urls() {
        let Fixture { service, .. } = fixture();

        let image = service
            .upload(CreateAssetParams::new("photo.png"), Bytes::from(png(10, 10)), None)
            .await
            .unwrap();
        assert_eq!(service.thumbnail_url(&image, "original"), "/assets/1/photo.png");
        assert_eq!(
            service.thumbnail_url(&image, "thumbnail"),
            "/assets/1/photo_thumbnail.png"
        );

        let pdf = upload(&service, "doc.pdf", "application/pdf").await;
        assert_eq!(service.thumbnail_url(&pdf, "icon"), "/images/assets/pdf_icon.png");
        assert_eq!(service.thumbnail_url(&pdf, "original"), "/assets/2/doc.pdf");

        let text = upload(&service, "notes.txt", "text/plain").await;
        assert_eq!(
            service.thumbnail_url(&text, "thumbnail"),
            "/images/assets/doc_thumbnail.png"
        );
    }

    #[tokio::test]
    async fn test_search_matches_case_insensitively() {
        let Fixture { service, .. } = fixture();
        let first = upload(&service, "CAT.PNG", "image/png").await;
        upload(&service, "dog.png", "image/png").await;
        let mut captioned = upload(&service, "x.pdf", "application/pdf").await;
        captioned = service
            .update_metadata(
                captioned.id.unwrap(),
                UpdateAssetParams {
                    title: None,
                    caption: Some("Also cat.png".into()),
                },
                None,
            )
            .await
            .unwrap();

        let page = service.search("cat.png", &[] as &[&str], 1).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![captioned.id, first.id]);
        assert_eq!(page.total_entries, 2);
        assert_eq!(page.per_page, SEARCH_PER_PAGE);
    }

    #[tokio::test]
    async fn test_filtered_total_counts_only_filtered() {
        let Fixture { service, .. } = fixture();
        for i in 0..12 {
            upload(&service, &format!("img{}.gif", i), "image/gif").await;
        }
        upload(&service, "a.pdf", "application/pdf").await;
        upload(&service, "b.txt", "text/plain").await;

        let page = service.search("", &["image"], 1).await.unwrap();
        assert_eq!(page.total_entries, 12);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total_pages(), 2);

        let page = service.search("", &["image"], 2).await.unwrap();
        assert_eq!(page.items.len(), 2);

        let others = service.search("", &["other"], 1).await.unwrap();
        assert_eq!(others.total_entries, 1);

        let unfiltered = service.search("", &[] as &[&str], 1).await.unwrap();
        assert_eq!(unfiltered.total_entries, 14);

        let custom = service
            .search_paginated("", &["image", "pdf"], PaginationParams::new(1, 50))
            .await
            .unwrap();
        assert_eq!(custom.items.len(), 13);

        assert!(matches!(
            service.search("", &["hologram"], 1).await,
            Err(AssetError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_file() {
        let Fixture { service, storage } = fixture();
        let asset = service
            .upload(CreateAssetParams::new("old.png"), Bytes::from(png(40, 20)), None)
            .await
            .unwrap();
        let id = asset.id.unwrap();

        let replaced = service
            .replace_file(id, CreateAssetParams::new("new.pdf"), Bytes::from_static(b"%PDF"), Some(9))
            .await
            .unwrap();

        assert_eq!(replaced.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(replaced.original_geometry(), None);
        assert_eq!(replaced.updated_by_id, Some(9));
        assert_eq!(replaced.title.as_deref(), Some("old"));
        assert_eq!(storage.keys().await, vec!["public/assets/1/new.pdf".to_string()]);

        assert!(matches!(
            service
                .replace_file(99, CreateAssetParams::new("x.pdf"), Bytes::new(), None)
                .await,
            Err(AssetError::NotFound(99))
        ));
    }

    /// Memory storage whose writes fail for keys containing `fail_on`
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_on: &'static str,
    }

    #[async_trait::async_trait]
    impl Storage for FlakyStorage {
        async fn put(&self, key: &str, data: Bytes) -> StorageResult<FileMetadata> {
            if key.contains(self.fail_on) {
                return Err(StorageError::BackendError("disk full".into()));
            }
            self.inner.put(key, data).await
        }

        async fn get(&self, key: &str) -> StorageResult<Bytes> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            self.inner.exists(key).await
        }

        fn public_url(&self, key: &str) -> Option<String> {
            self.inner.public_url(key)
        }

        fn path(&self, key: &str) -> String {
            self.inner.path(key)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_failed_replacement_keeps_previous_file() {
        for (fail_on, name, data) in [
            ("new.pdf", "new.pdf", Bytes::from_static(b"%PDF")),
            ("new_icon", "new.png", Bytes::from(png(20, 20))),
        ] {
            let storage = Arc::new(FlakyStorage {
                inner: MemoryStorage::new(),
                fail_on,
            });
            let service = AssetService::new(
                Arc::new(standard_registry()),
                Arc::new(MemoryAssetStore::new()),
                Arc::clone(&storage),
                AssetSettings::default(),
                AttachmentPaths::new(DEFAULT_URL_TEMPLATE, DEFAULT_PATH_TEMPLATE, "/srv/cms"),
            );

            let asset = service
                .upload(CreateAssetParams::new("old.png"), Bytes::from(png(40, 20)), None)
                .await
                .unwrap();
            let id = asset.id.unwrap();
            let before = storage.inner.keys().await;

            let err = service
                .replace_file(id, CreateAssetParams::new(name), data, Some(2))
                .await
                .unwrap_err();
            assert!(matches!(err, AssetError::Storage(StorageError::BackendError(_))));

            assert_eq!(storage.inner.keys().await, before);
            let stored = service.find(id).await.unwrap();
            assert_eq!(stored.file_name.as_deref(), Some("old.png"));
            assert_eq!(stored.original_geometry(), Some(Geometry::new(40, 20)));
            assert!(service.read_file(&service.locate_file(id, "original").await.unwrap()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_replace_with_same_name_keeps_new_files() {
        let Fixture { service, storage } = fixture();
        let asset = service
            .upload(CreateAssetParams::new("pic.png"), Bytes::from(png(40, 20)), None)
            .await
            .unwrap();
        let id = asset.id.unwrap();

        let replaced = service
            .replace_file(id, CreateAssetParams::new("pic.png"), Bytes::from(png(10, 30)), None)
            .await
            .unwrap();

        assert_eq!(replaced.original_geometry(), Some(Geometry::new(10, 30)));
        assert_eq!(storage.keys().await.len(), 3);
        let original = storage.get("public/assets/1/pic.png").await.unwrap();
        assert_eq!(RasterEngine.identify(&original).unwrap(), Geometry::new(10, 30));
    }

    #[tokio::test]
    async fn test_update_metadata_blank_title_falls_back() {
        let Fixture { service, .. } = fixture();
        let asset = upload(&service, "Sunset.jpg", "image/jpeg").await;
        let id = asset.id.unwrap();

        let updated = service
            .update_metadata(
                id,
                UpdateAssetParams {
                    title: Some("".into()),
                    caption: Some("Evening".into()),
                },
                Some(4),
            )
            .await
            .unwrap();

        assert_eq!(updated.title.as_deref(), Some("Sunset"));
        assert_eq!(updated.caption.as_deref(), Some("Evening"));
        assert_eq!(updated.updated_by_id, Some(4));
    }

    #[tokio::test]
    async fn test_delete_removes_files_and_attachments() {
        let Fixture { service, storage } = fixture();
        let asset = service
            .upload(CreateAssetParams::new("pic.png"), Bytes::from(png(10, 10)), None)
            .await
            .unwrap();
        let id = asset.id.unwrap();
        service.attach_to_page(id, 7, None).await.unwrap();

        service.delete(id).await.unwrap();

        assert!(storage.keys().await.is_empty());
        assert!(service.get(id).await.unwrap().is_none());
        assert!(service.attachments_for_page(7).await.unwrap().is_empty());
        assert!(matches!(service.delete(id).await, Err(AssetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_page_attachments() {
        let Fixture { service, .. } = fixture();
        let a = upload(&service, "a.pdf", "application/pdf").await.id.unwrap();
        let b = upload(&service, "b.pdf", "application/pdf").await.id.unwrap();

        let first = service.attach_to_page(a, 10, Some(1)).await.unwrap();
        let second = service.attach_to_page(b, 10, Some(1)).await.unwrap();
        let again = service.attach_to_page(a, 10, Some(1)).await.unwrap();
        service.attach_to_page(a, 11, None).await.unwrap();

        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);
        assert_eq!(again.id, first.id);

        let ids: Vec<_> = service
            .attachments_for_page(10)
            .await
            .unwrap()
            .iter()
            .map(|asset| asset.id.unwrap())
            .collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(service.pages_for_asset(a).await.unwrap(), vec![10, 11]);

        service.detach_from_page(a, 10).await.unwrap();
        assert!(matches!(
            service.detach_from_page(a, 10).await,
            Err(AssetError::AttachmentNotFound { .. })
        ));
        assert!(matches!(
            service.attach_to_page(404, 10, None).await,
            Err(AssetError::NotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_locate_file() {
        let Fixture { service, .. } = fixture();
        let asset = service
            .upload(CreateAssetParams::new("pic.png"), Bytes::from(png(10, 10)), None)
            .await
            .unwrap();
        let id = asset.id.unwrap();

        let original = service.locate_file(id, "original").await.unwrap();
        assert_eq!(original.key, "public/assets/1/pic.png");
        assert_eq!(original.path, "memory://public/assets/1/pic.png");
        assert_eq!(original.url, "/assets/1/pic.png");
        assert_eq!(original.public_url, None);
        assert_eq!(original.content_type, "image/png");
        assert_eq!(original.file_name, "pic.png");
        assert_eq!(
            service.read_file(&original).await.unwrap().len() as i64,
            asset.file_size.unwrap()
        );

        let icon = service.locate_file(id, "icon").await.unwrap();
        assert_eq!(icon.key, "public/assets/1/pic_icon.png");
        assert!(service.read_file(&icon).await.is_ok());

        assert!(matches!(
            service.locate_file(77, "original").await,
            Err(AssetError::NotFound(77))
        ));
    }
}
