//! Dynamic settings stored in the `config` table

use asset_core::{SettingValue, Settings};
use sqlx::{FromRow, PgPool};

use crate::RepositoryResult;

#[derive(Debug, Clone, FromRow)]
pub struct ConfigRow {
    pub key: String,
    pub value: Option<String>,
}

/// Key/value settings repository
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All rows as string settings; rows without a value are skipped
    pub async fn load(&self) -> RepositoryResult<Settings> {
        let rows = sqlx::query_as::<_, ConfigRow>("SELECT key, value FROM config ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        let settings = into_settings(rows);
        tracing::debug!(keys = settings.len(), "Settings loaded from database");
        Ok(settings)
    }

    pub async fn set(&self, key: &str, value: &str) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO config (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn into_settings(rows: Vec<ConfigRow>) -> Settings {
    let mut settings = Settings::new();
    for row in rows {
        if let Some(value) = row.value {
            settings.set(row.key, SettingValue::String(value));
        }
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_into_settings() {
        let rows = vec![
            ConfigRow {
                key: "assets.max_asset_size".into(),
                value: Some("5".into()),
            },
            ConfigRow {
                key: "assets.skip_filetype_validation".into(),
                value: None,
            },
        ];

        let settings = into_settings(rows);
        assert_eq!(settings.get_int("assets.max_asset_size"), Some(5));
        assert!(!settings.contains("assets.skip_filetype_validation"));
    }
}
