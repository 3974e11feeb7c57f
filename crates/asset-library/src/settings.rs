//! Typed view over the dynamic `assets.*` and `pagination.*` settings

use std::collections::{BTreeMap, HashMap};

use asset_core::{Settings, DEFAULT_PER_PAGE};
use tracing::debug;

use crate::asset_type::StyleSpec;

pub const DEFAULT_URL_TEMPLATE: &str = "/:class/:id/:basename:no_original_style.:extension";
pub const DEFAULT_PATH_TEMPLATE: &str =
    ":rails_root/public/:class/:id/:basename:no_original_style.:extension";

/// Where uploaded blobs live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket: Option<String>,
    pub region: String,
    /// Custom endpoint for S3-compatible providers
    pub endpoint: Option<String>,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            bucket: None,
            region: "us-east-1".to_string(),
            endpoint: None,
        }
    }
}

/// Additional thumbnail styles configured at runtime.
///
/// Values are comma-separated `name=WxH` lists. The global list applies to
/// images only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailSettings {
    pub global: Option<String>,
    pub per_type: HashMap<String, String>,
}

impl ThumbnailSettings {
    pub fn with_global(mut self, list: impl Into<String>) -> Self {
        self.global = Some(list.into());
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>, list: impl Into<String>) -> Self {
        self.per_type.insert(type_name.into(), list.into());
        self
    }

    /// Styles configured for `type_name`; global entries win over per-type ones
    pub fn configured_styles(&self, type_name: &str) -> BTreeMap<String, StyleSpec> {
        let mut styles = BTreeMap::new();

        if let Some(list) = self.per_type.get(type_name) {
            styles.extend(parse_style_list(list));
        }
        if type_name == "image" {
            if let Some(list) = &self.global {
                styles.extend(parse_style_list(list));
            }
        }

        styles
    }
}

/// Parse `name=WxH,name=WxH`, ignoring whitespace and malformed entries
pub fn parse_style_list(list: &str) -> Vec<(String, StyleSpec)> {
    let compact: String = list.chars().filter(|c| !c.is_whitespace()).collect();

    compact
        .split(',')
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((name, dimensions)) if !name.is_empty() && !dimensions.is_empty() => {
                Some((name.to_string(), StyleSpec::new(dimensions)))
            }
            _ => {
                debug!(entry = %entry, "Ignoring malformed thumbnail entry");
                None
            }
        })
        .collect()
}

/// Asset settings resolved from the dynamic configuration store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSettings {
    pub storage: StorageBackend,
    pub s3: S3Settings,
    pub url_template: String,
    pub path_template: String,
    /// Allowed upload content types; `None` accepts anything
    pub content_types: Option<Vec<String>>,
    /// Uploads must be strictly smaller than this many megabytes
    pub max_asset_size_mb: Option<u64>,
    pub thumbnails: ThumbnailSettings,
    pub per_page: i64,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Filesystem,
            s3: S3Settings::default(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
            content_types: None,
            max_asset_size_mb: None,
            thumbnails: ThumbnailSettings::default(),
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl AssetSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        let text = |key: &str| {
            settings
                .get_text(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let storage = match text("assets.storage").as_deref() {
            Some("s3") => StorageBackend::S3,
            _ => StorageBackend::Filesystem,
        };

        let s3 = S3Settings {
            access_key_id: text("assets.s3.key"),
            secret_access_key: text("assets.s3.secret"),
            bucket: text("assets.s3.bucket"),
            region: text("assets.s3.region").unwrap_or_else(|| S3Settings::default().region),
            endpoint: text("assets.s3.endpoint"),
        };

        let content_types = if settings.contains("assets.skip_filetype_validation") {
            None
        } else {
            text("assets.content_types").map(|list| {
                list.split(',')
                    .map(|t| t.replace(' ', ""))
                    .filter(|t| !t.is_empty())
                    .collect()
            })
        };

        let mut thumbnails = ThumbnailSettings {
            global: text("assets.additional_thumbnails"),
            per_type: HashMap::new(),
        };
        for key in settings.keys() {
            let type_name = key
                .strip_prefix("assets.additional_")
                .and_then(|rest| rest.strip_suffix("_thumbnails"));
            if let (Some(type_name), Some(list)) = (type_name, text(key)) {
                thumbnails.per_type.insert(type_name.to_string(), list);
            }
        }

        Self {
            storage,
            s3,
            url_template: text("assets.url").unwrap_or_else(|| DEFAULT_URL_TEMPLATE.to_string()),
            path_template: text("assets.path")
                .unwrap_or_else(|| DEFAULT_PATH_TEMPLATE.to_string()),
            content_types,
            max_asset_size_mb: settings
                .get_int("assets.max_asset_size")
                .and_then(|mb| u64::try_from(mb).ok()),
            thumbnails,
            per_page: settings
                .get_int("pagination.per_page")
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_PER_PAGE),
        }
    }

    /// Upload size limit in bytes; a limit too large to count in bytes is no limit
    pub fn max_asset_size_bytes(&self) -> Option<u64> {
        self.max_asset_size_mb
            .and_then(|mb| mb.checked_mul(1024 * 1024))
    }

    pub fn is_content_type_allowed(&self, content_type: &str) -> bool {
        match &self.content_types {
            Some(allowed) => allowed.iter().any(|t| t == content_type),
            None => true,
        }
    }
}
