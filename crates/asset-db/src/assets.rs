//! Assets repository
//!
//! `PgAssetStore` persists assets and page attachments in PostgreSQL and
//! translates [`MimeCondition`] filters into SQL.

use async_trait::async_trait;
use asset_core::{Audited, Id, Record};
use asset_library::{
    Asset, AssetError, AssetQuery, AssetResult, AssetStore, MimeCondition, PageAttachment,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::RepositoryError;

const ASSET_COLUMNS: &str = "id, asset_file_name, asset_content_type, asset_file_size, \
     asset_updated_at, title, caption, original_width, original_height, original_extension, \
     created_by_id, updated_by_id, created_at, updated_at";

const ATTACHMENT_COLUMNS: &str = "id, asset_id, page_id, position, created_by_id, created_at";

/// Columns searched by the free-text term
const SEARCH_COLUMNS: [&str; 3] = ["asset_file_name", "title", "caption"];

/// Asset row from database
#[derive(Debug, Clone, FromRow)]
pub struct AssetRow {
    pub id: i64,
    pub asset_file_name: Option<String>,
    pub asset_content_type: Option<String>,
    pub asset_file_size: Option<i64>,
    pub asset_updated_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub original_width: Option<i32>,
    pub original_height: Option<i32>,
    pub original_extension: Option<String>,
    pub created_by_id: Option<i64>,
    pub updated_by_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Asset {
            id: Some(row.id),
            file_name: row.asset_file_name,
            content_type: row.asset_content_type,
            file_size: row.asset_file_size,
            file_updated_at: row.asset_updated_at,
            title: row.title,
            caption: row.caption,
            original_width: row.original_width.and_then(|w| u32::try_from(w).ok()),
            original_height: row.original_height.and_then(|h| u32::try_from(h).ok()),
            original_extension: row.original_extension,
            created_by_id: row.created_by_id,
            updated_by_id: row.updated_by_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Page attachment row from database
#[derive(Debug, Clone, FromRow)]
pub struct PageAttachmentRow {
    pub id: i64,
    pub asset_id: i64,
    pub page_id: i64,
    pub position: i32,
    pub created_by_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<PageAttachmentRow> for PageAttachment {
    fn from(row: PageAttachmentRow) -> Self {
        PageAttachment {
            id: Some(row.id),
            asset_id: row.asset_id,
            page_id: row.page_id,
            position: row.position,
            created_by_id: row.created_by_id,
            created_at: row.created_at,
        }
    }
}

fn dimension(value: Option<u32>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

/// Escape LIKE wildcards; the pattern is bound, so quotes need no escaping
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Append a content type condition
pub fn push_condition(builder: &mut QueryBuilder<'_, Postgres>, condition: &MimeCondition) {
    match condition {
        MimeCondition::In(set) if set.is_empty() => {
            builder.push("FALSE");
        }
        MimeCondition::In(set) => {
            builder.push("asset_content_type IN (");
            let mut list = builder.separated(", ");
            for mime in set {
                list.push_bind(mime.clone());
            }
            list.push_unseparated(")");
        }
        MimeCondition::NotIn(set) if set.is_empty() => {
            builder.push("asset_content_type IS NOT NULL");
        }
        MimeCondition::NotIn(set) => {
            builder.push("NOT asset_content_type IN (");
            let mut list = builder.separated(", ");
            for mime in set {
                list.push_bind(mime.clone());
            }
            list.push_unseparated(")");
        }
        MimeCondition::Any(conditions) => push_group(builder, conditions, " OR ", "FALSE"),
        MimeCondition::All(conditions) => push_group(builder, conditions, " AND ", "TRUE"),
    }
}

fn push_group(
    builder: &mut QueryBuilder<'_, Postgres>,
    conditions: &[MimeCondition],
    joiner: &str,
    empty: &str,
) {
    if conditions.is_empty() {
        builder.push(empty);
        return;
    }

    builder.push("(");
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            builder.push(joiner);
        }
        push_condition(builder, condition);
    }
    builder.push(")");
}

fn push_term(builder: &mut QueryBuilder<'_, Postgres>, term: &str) {
    let pattern = format!("%{}%", escape_like(term));

    builder.push("(");
    for (i, column) in SEARCH_COLUMNS.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push(format!("LOWER({}) LIKE ", column));
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\'");
    }
    builder.push(")");
}

/// Append the WHERE clause for a search
pub fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &AssetQuery) {
    let mut first = true;

    if let Some(term) = &query.term {
        builder.push(" WHERE ");
        push_term(builder, term);
        first = false;
    }

    if let Some(condition) = &query.condition {
        builder.push(if first { " WHERE " } else { " AND " });
        push_condition(builder, condition);
    }
}

/// Page of matching assets, newest first
pub fn search_query(query: &AssetQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {} FROM assets", ASSET_COLUMNS));
    push_filters(&mut builder, query);
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(query.limit);
    builder.push(" OFFSET ");
    builder.push_bind(query.offset);
    builder
}

/// Number of matching assets, with the same filters as [`search_query`]
pub fn count_query(query: &AssetQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM assets");
    push_filters(&mut builder, query);
    builder
}

/// PostgreSQL-backed [`AssetStore`]
pub struct PgAssetStore {
    pool: PgPool,
}

impl PgAssetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_attachment(
        &self,
        asset_id: Id,
        page_id: Id,
    ) -> Result<Option<PageAttachmentRow>, RepositoryError> {
        let row = sqlx::query_as::<_, PageAttachmentRow>(&format!(
            "SELECT {} FROM page_attachments WHERE asset_id = $1 AND page_id = $2",
            ATTACHMENT_COLUMNS
        ))
        .bind(asset_id)
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl AssetStore for PgAssetStore {
    async fn create(&self, asset: &mut Asset) -> AssetResult<Id> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO assets (
                asset_file_name, asset_content_type, asset_file_size, asset_updated_at,
                title, caption, original_width, original_height, original_extension,
                created_by_id, updated_by_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(&asset.file_name)
        .bind(&asset.content_type)
        .bind(asset.file_size)
        .bind(asset.file_updated_at)
        .bind(&asset.title)
        .bind(&asset.caption)
        .bind(dimension(asset.original_width))
        .bind(dimension(asset.original_height))
        .bind(&asset.original_extension)
        .bind(asset.created_by_id)
        .bind(asset.updated_by_id)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        asset.id = Some(id);
        debug!(id = id, "Asset row inserted");
        Ok(id)
    }

    async fn get(&self, id: Id) -> AssetResult<Option<Asset>> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "SELECT {} FROM assets WHERE id = $1",
            ASSET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(Asset::from))
    }

    async fn update(&self, asset: &Asset) -> AssetResult<()> {
        let id = asset.id().ok_or(AssetError::NotFound(0))?;

        let result = sqlx::query(
            r#"
            UPDATE assets
            SET asset_file_name = $2, asset_content_type = $3, asset_file_size = $4,
                asset_updated_at = $5, title = $6, caption = $7, original_width = $8,
                original_height = $9, original_extension = $10, updated_by_id = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&asset.file_name)
        .bind(&asset.content_type)
        .bind(asset.file_size)
        .bind(asset.file_updated_at)
        .bind(&asset.title)
        .bind(&asset.caption)
        .bind(dimension(asset.original_width))
        .bind(dimension(asset.original_height))
        .bind(&asset.original_extension)
        .bind(asset.updated_by_id())
        .bind(Audited::updated_at(asset))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(AssetError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Id) -> AssetResult<()> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        sqlx::query("DELETE FROM page_attachments WHERE asset_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn search(&self, query: &AssetQuery) -> AssetResult<(Vec<Asset>, i64)> {
        let rows = search_query(query)
            .build_query_as::<AssetRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let total = count_query(query)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok((rows.into_iter().map(Asset::from).collect(), total))
    }

    async fn attach(&self, attachment: &mut PageAttachment) -> AssetResult<Id> {
        let inserted = sqlx::query_as::<_, PageAttachmentRow>(&format!(
            r#"
            INSERT INTO page_attachments (asset_id, page_id, position, created_by_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (asset_id, page_id) DO NOTHING
            RETURNING {}
            "#,
            ATTACHMENT_COLUMNS
        ))
        .bind(attachment.asset_id)
        .bind(attachment.page_id)
        .bind(attachment.position)
        .bind(attachment.created_by_id)
        .bind(attachment.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let row = match inserted {
            Some(row) => row,
            None => self
                .find_attachment(attachment.asset_id, attachment.page_id)
                .await?
                .ok_or(AssetError::AttachmentNotFound {
                    asset_id: attachment.asset_id,
                    page_id: attachment.page_id,
                })?,
        };

        *attachment = PageAttachment::from(row);
        Ok(attachment.id.unwrap_or_default())
    }

    async fn detach(&self, asset_id: Id, page_id: Id) -> AssetResult<bool> {
        let result = sqlx::query("DELETE FROM page_attachments WHERE asset_id = $1 AND page_id = $2")
            .bind(asset_id)
            .bind(page_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn attachments_for_asset(&self, asset_id: Id) -> AssetResult<Vec<PageAttachment>> {
        let rows = sqlx::query_as::<_, PageAttachmentRow>(&format!(
            "SELECT {} FROM page_attachments WHERE asset_id = $1 ORDER BY page_id",
            ATTACHMENT_COLUMNS
        ))
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(PageAttachment::from).collect())
    }

    async fn attachments_for_page(&self, page_id: Id) -> AssetResult<Vec<PageAttachment>> {
        let rows = sqlx::query_as::<_, PageAttachmentRow>(&format!(
            "SELECT {} FROM page_attachments WHERE page_id = $1 ORDER BY position, id",
            ATTACHMENT_COLUMNS
        ))
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(PageAttachment::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_library::standard_registry;

    fn where_sql(query: &AssetQuery) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("");
        push_filters(&mut builder, query);
        builder.sql().to_string()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("test"), "test");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\dir"), "c:\\\\dir");
        assert_eq!(escape_like("it's"), "it's");
    }

    #[test]
    fn test_unfiltered_search() {
        let query = AssetQuery::new(10, 20);
        assert_eq!(
            search_query(&query).sql(),
            format!(
                "SELECT {} FROM assets ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
                ASSET_COLUMNS
            )
        );
        assert_eq!(count_query(&query).sql(), "SELECT COUNT(*) FROM assets");
    }

    #[test]
    fn test_term_searches_three_columns() {
        let query = AssetQuery::new(10, 0).term("Cat");
        assert_eq!(
            where_sql(&query),
            " WHERE (LOWER(asset_file_name) LIKE $1 ESCAPE '\\' \
             OR LOWER(title) LIKE $2 ESCAPE '\\' \
             OR LOWER(caption) LIKE $3 ESCAPE '\\')"
        );
    }

    #[test]
    fn test_condition_after_term() {
        let query = AssetQuery::new(10, 0)
            .term("cat")
            .condition(Some(MimeCondition::is_in(["image/gif", "image/png"])));
        let sql = where_sql(&query);
        assert!(sql.ends_with(" AND asset_content_type IN ($4, $5)"));

        let count = count_query(&query);
        assert!(count.sql().starts_with("SELECT COUNT(*) FROM assets WHERE (LOWER("));
        assert!(count.sql().ends_with("IN ($4, $5)"));
    }

    #[test]
    fn test_condition_translation() {
        let sql = |condition: MimeCondition| {
            let mut builder = QueryBuilder::<Postgres>::new("");
            push_condition(&mut builder, &condition);
            builder.sql().to_string()
        };

        assert_eq!(sql(MimeCondition::is_in(Vec::<String>::new())), "FALSE");
        assert_eq!(
            sql(MimeCondition::not_in(Vec::<String>::new())),
            "asset_content_type IS NOT NULL"
        );
        assert_eq!(
            sql(MimeCondition::not_in(["application/pdf"])),
            "NOT asset_content_type IN ($1)"
        );
        assert_eq!(
            sql(MimeCondition::Any(vec![
                MimeCondition::is_in(["image/png"]),
                MimeCondition::not_in(["image/png", "application/pdf"]),
            ])),
            "(asset_content_type IN ($1) OR NOT asset_content_type IN ($2, $3))"
        );
        assert_eq!(sql(MimeCondition::All(vec![])), "TRUE");
    }

    #[test]
    fn test_registry_conditions_translate() {
        let registry = standard_registry();

        let other = registry.condition_for(&["other"]).unwrap();
        let query = AssetQuery::new(10, 0).condition(Some(other));
        let sql = where_sql(&query);
        assert!(sql.starts_with(" WHERE NOT asset_content_type IN ($1, "));

        let images = registry.condition_for(&["image"]).unwrap();
        let query = AssetQuery::new(10, 0).condition(Some(images));
        assert!(where_sql(&query).starts_with(" WHERE asset_content_type IN ($1, "));
    }

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let row = AssetRow {
            id: 7,
            asset_file_name: Some("cat.png".into()),
            asset_content_type: Some("image/png".into()),
            asset_file_size: Some(1024),
            asset_updated_at: Some(now),
            title: Some("cat".into()),
            caption: None,
            original_width: Some(800),
            original_height: Some(-1),
            original_extension: Some("png".into()),
            created_by_id: Some(1),
            updated_by_id: None,
            created_at: now,
            updated_at: now,
        };

        let asset = Asset::from(row);
        assert_eq!(asset.id, Some(7));
        assert_eq!(asset.original_width, Some(800));
        assert_eq!(asset.original_height, None);
        assert_eq!(asset.original_geometry(), None);
        assert_eq!(dimension(Some(600)), Some(600));
    }
}
