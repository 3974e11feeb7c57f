//! Asset and page attachment records

use asset_core::{Audited, Id, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// One uploaded file and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Option<Id>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub file_updated_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub caption: Option<String>,
    /// Captured from the file at upload time, never recomputed
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    pub original_extension: Option<String>,
    pub created_by_id: Option<Id>,
    pub updated_by_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Asset {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: None,
            file_name: None,
            content_type: None,
            file_size: None,
            file_updated_at: None,
            title: None,
            caption: None,
            original_width: None,
            original_height: None,
            original_extension: None,
            created_by_id: None,
            updated_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Asset {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, file_size: i64) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            file_size: Some(file_size),
            file_updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn has_file(&self) -> bool {
        self.file_name.is_some()
    }

    /// File name without its final extension
    pub fn base_name(&self) -> Option<&str> {
        let name = self.file_name.as_deref()?;
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        match name.rfind('.') {
            Some(dot) if dot > 0 => Some(&name[..dot]),
            _ => Some(name),
        }
    }

    /// Lower-cased text after the last `.` of the file name
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
    }

    /// Default a blank title to the base name
    pub fn assign_title(&mut self) {
        let blank = self.title.as_deref().map_or(true, |t| t.trim().is_empty());
        if blank {
            self.title = self.base_name().map(str::to_string);
        }
    }

    /// Stored dimensions; `None` until the upload captured them
    pub fn original_geometry(&self) -> Option<Geometry> {
        match (self.original_width, self.original_height) {
            (Some(width), Some(height)) => Some(Geometry::new(width, height)),
            _ => None,
        }
    }

    pub fn clear_dimensions(&mut self) {
        self.original_width = None;
        self.original_height = None;
        self.original_extension = None;
    }

    pub fn touch(&mut self, user_id: Option<Id>) {
        self.updated_at = Utc::now();
        if user_id.is_some() {
            self.updated_by_id = user_id;
        }
    }
}

impl Record for Asset {
    fn id(&self) -> Option<Id> {
        self.id
    }
}

impl Audited for Asset {
    fn created_by_id(&self) -> Option<Id> {
        self.created_by_id
    }

    fn updated_by_id(&self) -> Option<Id> {
        self.updated_by_id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Link between an asset and a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAttachment {
    pub id: Option<Id>,
    pub asset_id: Id,
    pub page_id: Id,
    /// 1-based order of the asset on its page
    pub position: i32,
    pub created_by_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

impl PageAttachment {
    pub fn new(asset_id: Id, page_id: Id, position: i32) -> Self {
        Self {
            id: None,
            asset_id,
            page_id,
            position,
            created_by_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn created_by(mut self, user_id: Option<Id>) -> Self {
        self.created_by_id = user_id;
        self
    }
}

impl Record for PageAttachment {
    fn id(&self) -> Option<Id> {
        self.id
    }
}

/// Parameters for uploading a file
#[derive(Debug, Clone, Default)]
pub struct CreateAssetParams {
    pub file_name: Option<String>,
    /// Guessed from the file name when absent
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
}

impl CreateAssetParams {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            ..Default::default()
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Metadata edit; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAssetParams {
    pub title: Option<String>,
    pub caption: Option<String>,
}
