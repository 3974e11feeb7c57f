//! Record traits shared by the store implementations

use chrono::{DateTime, Utc};

/// Primary key type
pub type Id = i64;

/// A row owned by a store; the id is assigned on insert
pub trait Record {
    fn id(&self) -> Option<Id>;

    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }
}

/// Records that remember their editors
pub trait Audited: Record {
    fn created_by_id(&self) -> Option<Id>;
    fn updated_by_id(&self) -> Option<Id>;
    fn updated_at(&self) -> DateTime<Utc>;
}
