//! AssetType Registry
//!
//! Asset types are named classification buckets keyed by MIME type. The
//! registry is assembled once with [`RegistryBuilder`] and is read-only
//! afterwards, so it can be shared behind an `Arc` without locking.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::condition::MimeCondition;
use crate::settings::ThumbnailSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown asset type: {0}")]
    UnknownType(String),
    #[error("MIME type {mime} is claimed by {owner} and {claimant}")]
    DuplicateMime {
        mime: String,
        owner: String,
        claimant: String,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Target dimensions and optional output format of a derived rendition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleSpec {
    pub dimensions: String,
    pub format: Option<String>,
}

impl StyleSpec {
    pub fn new(dimensions: impl Into<String>) -> Self {
        Self {
            dimensions: dimensions.into(),
            format: None,
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// A named classification bucket with its processing rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetType {
    pub name: String,
    pub mime_types: Vec<String>,
    pub processors: Vec<String>,
    pub styles: BTreeMap<String, StyleSpec>,
}

impl AssetType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_types: Vec::new(),
            processors: Vec::new(),
            styles: BTreeMap::new(),
        }
    }

    pub fn mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mime_types.extend(mime_types.into_iter().map(Into::into));
        self
    }

    pub fn processor(mut self, processor: impl Into<String>) -> Self {
        self.processors.push(processor.into());
        self
    }

    pub fn style(mut self, name: impl Into<String>, spec: StyleSpec) -> Self {
        self.styles.insert(name.into(), spec);
        self
    }

    /// A type without MIME types catches everything left unclaimed
    pub fn is_catch_all(&self) -> bool {
        self.mime_types.is_empty()
    }

    /// Static styles overlaid with the configured additional thumbnails
    pub fn styles_with(&self, thumbnails: &ThumbnailSettings) -> BTreeMap<String, StyleSpec> {
        let mut styles = self.styles.clone();
        styles.extend(thumbnails.configured_styles(&self.name));
        styles
    }

    pub fn style_dimensions(&self, style: &str, thumbnails: &ThumbnailSettings) -> Option<String> {
        self.styles_with(thumbnails)
            .remove(style)
            .map(|spec| spec.dimensions)
    }

    pub fn style_format(&self, style: &str, thumbnails: &ThumbnailSettings) -> Option<String> {
        self.styles_with(thumbnails)
            .remove(style)
            .and_then(|spec| spec.format)
    }

    /// `MIME ∈ declared set`
    pub fn condition(&self) -> MimeCondition {
        MimeCondition::is_in(self.mime_types.iter().cloned())
    }

    /// `MIME ∉ declared set`
    pub fn non_condition(&self) -> MimeCondition {
        MimeCondition::not_in(self.mime_types.iter().cloned())
    }
}

/// Collects type registrations and resolves MIME ownership
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: Vec<AssetType>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, asset_type: AssetType) -> Self {
        self.types.push(asset_type);
        self
    }

    /// First registrant wins a contested MIME type; later claims are logged and ignored.
    pub fn build(self) -> AssetTypeRegistry {
        let mut registry = AssetTypeRegistry::default();
        for asset_type in self.types {
            registry.insert(asset_type);
        }
        registry
    }

    /// Like [`build`](Self::build), but a MIME type claimed twice is an error
    pub fn build_strict(self) -> RegistryResult<AssetTypeRegistry> {
        let mut registry = AssetTypeRegistry::default();
        for asset_type in self.types {
            if let Some(err) = registry.first_collision(&asset_type) {
                return Err(err);
            }
            registry.insert(asset_type);
        }
        Ok(registry)
    }
}

/// Read-only table of registered asset types
#[derive(Debug, Default, Clone)]
pub struct AssetTypeRegistry {
    types: Vec<AssetType>,
    by_name: HashMap<String, usize>,
    mime_lookup: HashMap<String, usize>,
    known_mimes: Vec<String>,
}

impl AssetTypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A MIME type of `asset_type` already owned by another registered type
    fn first_collision(&self, asset_type: &AssetType) -> Option<RegistryError> {
        if self.by_name.contains_key(&asset_type.name) {
            return None;
        }
        asset_type.mime_types.iter().find_map(|mime| {
            self.mime_lookup.get(mime).map(|&owner| RegistryError::DuplicateMime {
                mime: mime.clone(),
                owner: self.types[owner].name.clone(),
                claimant: asset_type.name.clone(),
            })
        })
    }

    fn insert(&mut self, asset_type: AssetType) {
        if self.by_name.contains_key(&asset_type.name) {
            warn!(name = %asset_type.name, "Asset type registered twice, keeping the first");
            return;
        }

        let index = self.types.len();
        let mut shadowed = 0;
        for mime in &asset_type.mime_types {
            match self.mime_lookup.get(mime).copied() {
                Some(owner) if owner == index => {}
                Some(owner) => {
                    debug!(
                        mime = %mime,
                        owner = %self.types[owner].name,
                        claimant = %asset_type.name,
                        "MIME type already claimed"
                    );
                    shadowed += 1;
                }
                None => {
                    self.mime_lookup.insert(mime.clone(), index);
                    self.known_mimes.push(mime.clone());
                }
            }
        }
        if shadowed > 0 {
            warn!(
                name = %asset_type.name,
                shadowed,
                "MIME types already claimed by earlier asset types are ignored"
            );
        }

        self.by_name.insert(asset_type.name.clone(), index);
        self.types.push(asset_type);
    }

    /// Exact-match lookup; `None` means unclassified ("other")
    pub fn classify(&self, mime_type: &str) -> Option<&AssetType> {
        self.mime_lookup.get(mime_type).map(|&i| &self.types[i])
    }

    pub fn find(&self, name: &str) -> Option<&AssetType> {
        self.by_name.get(name).map(|&i| &self.types[i])
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Type names in registration order
    pub fn known_types(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn types(&self) -> impl Iterator<Item = &AssetType> {
        self.types.iter()
    }

    /// Every claimed MIME type, in the order it was claimed
    pub fn known_mime_types(&self) -> &[String] {
        &self.known_mimes
    }

    pub fn mime_types_for<S: AsRef<str>>(&self, names: &[S]) -> RegistryResult<Vec<String>> {
        let mut mimes = Vec::new();
        for name in names {
            mimes.extend(self.require(name.as_ref())?.mime_types.iter().cloned());
        }
        Ok(mimes)
    }

    pub fn styles_for(
        &self,
        name: &str,
        thumbnails: &ThumbnailSettings,
    ) -> RegistryResult<BTreeMap<String, StyleSpec>> {
        Ok(self.require(name)?.styles_with(thumbnails))
    }

    pub fn processors_for(&self, name: &str) -> RegistryResult<&[String]> {
        Ok(&self.require(name)?.processors)
    }

    /// Assets whose content type belongs to any of the named types.
    ///
    /// A catch-all type contributes "not claimed by any type".
    pub fn condition_for<S: AsRef<str>>(&self, names: &[S]) -> RegistryResult<MimeCondition> {
        let mut conditions = Vec::with_capacity(names.len());
        for name in names {
            let asset_type = self.require(name.as_ref())?;
            if asset_type.is_catch_all() {
                conditions.push(self.other_condition());
            } else {
                conditions.push(asset_type.condition());
            }
        }
        Ok(MimeCondition::any(conditions))
    }

    pub fn non_condition_for<S: AsRef<str>>(&self, names: &[S]) -> RegistryResult<MimeCondition> {
        Ok(self.condition_for(names)?.negate())
    }

    /// Content type not claimed by any registered type
    pub fn other_condition(&self) -> MimeCondition {
        MimeCondition::not_in(self.known_mimes.iter().cloned())
    }

    /// Content type claimed by some registered type
    pub fn non_other_condition(&self) -> MimeCondition {
        MimeCondition::is_in(self.known_mimes.iter().cloned())
    }

    fn require(&self, name: &str) -> RegistryResult<&AssetType> {
        self.find(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::standard_registry;
    use std::collections::HashSet;

    fn small_registry() -> AssetTypeRegistry {
        AssetTypeRegistry::builder()
            .register(AssetType::new("image").mime_types(["image/png", "image/jpeg"]))
            .register(AssetType::new("pdf").mime_types(["application/pdf"]))
            .register(AssetType::new("scan").mime_types(["image/png", "image/tiff"]))
            .register(AssetType::new("other"))
            .build()
    }

    #[test]
    fn test_classify_first_registrant_wins() {
        let registry = small_registry();
        assert_eq!(registry.classify("image/png").unwrap().name, "image");
        assert_eq!(registry.classify("image/tiff").unwrap().name, "scan");
        assert!(registry.classify("text/plain").is_none());
        assert_eq!(
            registry.known_mime_types(),
            &["image/png", "image/jpeg", "application/pdf", "image/tiff"]
        );
    }

    #[test]
    fn test_strict_rejects_collisions() {
        let result = AssetTypeRegistry::builder()
            .register(AssetType::new("image").mime_types(["image/png"]))
            .register(AssetType::new("scan").mime_types(["image/png"]))
            .build_strict();

        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateMime {
                mime: "image/png".into(),
                owner: "image".into(),
                claimant: "scan".into(),
            }
        );
    }

    #[test]
    fn test_repeated_mime_within_one_type() {
        let types = || {
            AssetTypeRegistry::builder()
                .register(AssetType::new("image").mime_types(["image/png", "image/png"]))
                .register(AssetType::new("pdf").mime_types(["application/pdf"]))
        };

        let lenient = types().build();
        let strict = types().build_strict().unwrap();
        for registry in [lenient, strict] {
            assert_eq!(registry.classify("image/png").unwrap().name, "image");
            assert_eq!(registry.known_mime_types(), &["image/png", "application/pdf"]);
        }
    }

    #[test]
    fn test_strict_tolerates_duplicate_name() {
        let registry = AssetTypeRegistry::builder()
            .register(AssetType::new("image").mime_types(["image/png"]))
            .register(AssetType::new("image").mime_types(["image/png"]))
            .build_strict()
            .unwrap();

        assert_eq!(registry.known_types(), vec!["image"]);
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let registry = AssetTypeRegistry::builder()
            .register(AssetType::new("image").mime_types(["image/png"]))
            .register(AssetType::new("image").mime_types(["image/gif"]))
            .build();

        assert_eq!(registry.known_types(), vec!["image"]);
        assert!(registry.classify("image/gif").is_none());
    }

    #[test]
    fn test_claimed_mime_sets_are_disjoint() {
        let registry = standard_registry();
        let mut seen = HashSet::new();
        for mime in registry.known_mime_types() {
            assert!(seen.insert(mime.clone()), "{} claimed twice", mime);
            let owner = registry.classify(mime).unwrap();
            assert!(owner.mime_types.contains(mime));
        }
    }

    #[test]
    fn test_classify_is_stable() {
        let registry = standard_registry();
        let first: Vec<_> = ["image/gif", "audio/mpeg", "video/mp4", "text/plain"]
            .iter()
            .map(|m| registry.classify(m).map(|t| t.name.clone()))
            .collect();
        let second: Vec<_> = ["text/plain", "video/mp4", "audio/mpeg", "image/gif"]
            .iter()
            .rev()
            .map(|m| registry.classify(m).map(|t| t.name.clone()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_condition_for() {
        let registry = small_registry();

        let condition = registry.condition_for(&["image", "pdf"]).unwrap();
        assert!(condition.matches(Some("image/jpeg")));
        assert!(condition.matches(Some("application/pdf")));
        assert!(!condition.matches(Some("image/tiff")));

        let negated = registry.non_condition_for(&["image"]).unwrap();
        assert!(negated.matches(Some("application/pdf")));
        assert!(!negated.matches(Some("image/png")));
    }

    #[test]
    fn test_condition_for_catch_all() {
        let registry = small_registry();
        let others = registry.condition_for(&["other"]).unwrap();
        assert_eq!(others, registry.other_condition());
        assert!(others.matches(Some("text/plain")));
        assert!(!others.matches(Some("image/tiff")));

        assert!(registry.non_other_condition().matches(Some("image/tiff")));
    }

    #[test]
    fn test_unknown_type() {
        let registry = small_registry();
        assert_eq!(
            registry.condition_for(&["sculpture"]).unwrap_err(),
            RegistryError::UnknownType("sculpture".into())
        );
        assert!(registry.mime_types_for(&["nope"]).is_err());
        assert!(!registry.is_known("nope"));
    }

    #[test]
    fn test_mime_types_for_uses_declared_sets() {
        let registry = small_registry();
        let mimes = registry.mime_types_for(&["scan"]).unwrap();
        assert_eq!(mimes, vec!["image/png", "image/tiff"]);
    }

    #[test]
    fn test_styles_for_merges_configuration() {
        let registry = standard_registry();
        let thumbnails = ThumbnailSettings::default().with_global("mini=50x50");

        let styles = registry.styles_for("image", &thumbnails).unwrap();
        assert_eq!(styles.get("mini"), Some(&StyleSpec::new("50x50")));
        assert_eq!(
            styles.get("icon"),
            Some(&StyleSpec::new("42x42#").format("png"))
        );
        assert_eq!(
            styles.get("thumbnail"),
            Some(&StyleSpec::new("100x100#").format("png"))
        );

        let pdf_styles = registry.styles_for("pdf", &thumbnails).unwrap();
        assert!(pdf_styles.is_empty());
    }

    #[test]
    fn test_style_dimensions_and_format() {
        let registry = standard_registry();
        let thumbnails = ThumbnailSettings::default();
        let image = registry.find("image").unwrap();

        assert_eq!(
            image.style_dimensions("icon", &thumbnails).as_deref(),
            Some("42x42#")
        );
        assert_eq!(image.style_format("icon", &thumbnails).as_deref(), Some("png"));
        assert_eq!(image.style_dimensions("poster", &thumbnails), None);
        assert_eq!(
            registry.processors_for("image").unwrap(),
            &["thumbnail".to_string()]
        );
    }
}
