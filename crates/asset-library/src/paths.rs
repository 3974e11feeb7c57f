//! URL and path templates for stored files
//!
//! Templates use `:token` placeholders:
//!
//! | token | value |
//! |---|---|
//! | `:rails_root` | storage root |
//! | `:class` | `assets` |
//! | `:id` | asset id |
//! | `:basename` | file name without extension |
//! | `:extension` | style format, else the file's extension |
//! | `:style` | style name |
//! | `:no_original_style` | `_style`, empty for the original |
//!
//! Unknown tokens are left as written.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::Asset;
use crate::settings::AssetSettings;

pub const ORIGINAL_STYLE: &str = "original";

const CLASS_SEGMENT: &str = "assets";

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":([a-z_]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPaths {
    url_template: String,
    path_template: String,
    root: String,
}

impl AttachmentPaths {
    pub fn new(
        url_template: impl Into<String>,
        path_template: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            url_template: url_template.into(),
            path_template: path_template.into(),
            root: root.into(),
        }
    }

    pub fn from_settings(settings: &AssetSettings, root: impl Into<String>) -> Self {
        Self::new(&settings.url_template, &settings.path_template, root)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Public URL of `style`
    pub fn url(&self, asset: &Asset, style: &str, format: Option<&str>) -> String {
        interpolate(&self.url_template, asset, style, format, &self.root)
    }

    /// Absolute filesystem path of `style`
    pub fn path(&self, asset: &Asset, style: &str, format: Option<&str>) -> String {
        interpolate(&self.path_template, asset, style, format, &self.root)
    }

    /// Storage key of `style`: the path template relative to the root
    pub fn key(&self, asset: &Asset, style: &str, format: Option<&str>) -> String {
        interpolate(&self.path_template, asset, style, format, "")
            .trim_start_matches('/')
            .to_string()
    }
}

fn interpolate(
    template: &str,
    asset: &Asset,
    style: &str,
    format: Option<&str>,
    root: &str,
) -> String {
    TOKEN_PATTERN
        .replace_all(template, |caps: &Captures| {
            let token = &caps[1];
            match token {
                "rails_root" => root.trim_end_matches('/').to_string(),
                "class" => CLASS_SEGMENT.to_string(),
                "id" => asset.id.map(|id| id.to_string()).unwrap_or_default(),
                "basename" => asset.base_name().unwrap_or_default().to_string(),
                "extension" => format
                    .map(str::to_string)
                    .or_else(|| asset.extension())
                    .unwrap_or_default(),
                "style" => style.to_string(),
                "no_original_style" if style == ORIGINAL_STYLE => String::new(),
                "no_original_style" => format!("_{}", style),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}
