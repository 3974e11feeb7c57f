//! Asset representers
//!
//! Convert assets and pages of assets to their JSON form.

use std::collections::{BTreeMap, BTreeSet};

use asset_core::{Id, Page};
use asset_library::{Asset, AssetService, AssetStore, Storage, ORIGINAL_STYLE};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Asset representation for API responses
#[derive(Debug, Clone, Serialize)]
pub struct AssetRepresentation {
    pub id: Option<Id>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub title: Option<String>,
    pub caption: Option<String>,
    /// Registered type name; absent for unclassified content types
    pub asset_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<&'static str>,
    pub url: String,
    /// Thumbnail URL per size name, including `original`
    pub thumbnails: BTreeMap<String, String>,
    pub created_by_id: Option<Id>,
    pub updated_by_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct AssetRepresenter;

impl AssetRepresenter {
    pub fn represent<St, S>(asset: &Asset, service: &AssetService<St, S>) -> AssetRepresentation
    where
        St: AssetStore + ?Sized,
        S: Storage + ?Sized,
    {
        let view = service.view(asset);
        let geometry = view
            .is_image()
            .then(|| view.geometry(ORIGINAL_STYLE))
            .flatten();

        let orientation = geometry.filter(|g| g.width > 0 && g.height > 0).map(|_| {
            if view.is_square(ORIGINAL_STYLE) {
                "square"
            } else if view.is_horizontal(ORIGINAL_STYLE) {
                "horizontal"
            } else {
                "vertical"
            }
        });

        let thumbnails = Self::thumbnail_sizes(service)
            .into_iter()
            .map(|size| {
                let url = service.thumbnail_url(asset, &size);
                (size, url)
            })
            .collect();

        AssetRepresentation {
            id: asset.id,
            file_name: asset.file_name.clone(),
            content_type: asset.content_type.clone(),
            file_size: asset.file_size,
            title: asset.title.clone(),
            caption: asset.caption.clone(),
            asset_type: view.type_name().map(str::to_string),
            width: geometry.map(|g| g.width),
            height: geometry.map(|g| g.height),
            orientation,
            url: service.style_url(asset, ORIGINAL_STYLE),
            thumbnails,
            created_by_id: asset.created_by_id,
            updated_by_id: asset.updated_by_id,
            created_at: asset.created_at,
            updated_at: asset.updated_at,
        }
    }

    /// `original` plus every style any registered type renders
    fn thumbnail_sizes<St, S>(service: &AssetService<St, S>) -> BTreeSet<String>
    where
        St: AssetStore + ?Sized,
        S: Storage + ?Sized,
    {
        let thumbnails = &service.settings().thumbnails;
        let mut sizes: BTreeSet<String> = service
            .registry()
            .types()
            .flat_map(|t| t.styles_with(thumbnails).into_keys())
            .collect();
        sizes.insert(ORIGINAL_STYLE.to_string());
        sizes
    }
}

/// Paginated collection
#[derive(Debug, Clone, Serialize)]
pub struct PageRepresentation<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total_entries: i64,
    pub total_pages: i64,
}

impl<T> PageRepresentation<T> {
    pub fn from_page<U>(page: Page<U>, f: impl FnMut(U) -> T) -> Self {
        let total_pages = page.total_pages();
        let page = page.map(f);
        Self {
            items: page.items,
            page: page.page,
            per_page: page.per_page,
            total_entries: page.total_entries,
            total_pages,
        }
    }
}
