// ==========================================
// 多店铺配置存储 - 配置项仓储
// ==========================================
// 职责: 管理 configuration 表 (key + 作用域层级 + 作用域ID)
// 约束: (key, scope_level, scope_id) 唯一，写入即 Upsert
// 说明: 全部店铺作用域以 scope_id = 0 落库
//       (SQLite 的 UNIQUE 约束视 NULL 互不相等，无法保证唯一)
// 红线: Repository 不含继承逻辑，只做精确作用域读写
// ==========================================

use crate::db::{open_sqlite_connection, CONFIGURATION_SCHEMA_SQL};
use crate::domain::{ScopeLevel, ShopConstraint};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// 全部店铺作用域的落库 scope_id
const ALL_SHOPS_SCOPE_ID: i64 = 0;

/// 配置项实体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationEntity {
    pub key: String,               // 配置键
    pub scope_level: ScopeLevel,   // 作用域层级
    pub scope_id: Option<i64>,     // 店铺组ID / 店铺ID（全部店铺为 None）
    pub value: String,             // 配置值
    pub updated_at: String,        // 更新时间
}

fn stored_scope_id(scope: &ShopConstraint) -> i64 {
    scope.scope_id().unwrap_or(ALL_SHOPS_SCOPE_ID)
}

/// 统一使用 UTC，与列默认值 datetime('now') 一致
fn now_string() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub struct ConfigurationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigurationRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(CONFIGURATION_SCHEMA_SQL)?;
        Ok(())
    }

    /// 写入配置（Upsert 操作）
    /// 如果 (key, scope_level, scope_id) 已存在，则覆盖值；否则插入
    pub fn upsert(&self, key: &str, scope: &ShopConstraint, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_with(&conn, key, scope, value, &now_string())?;
        tracing::debug!(key = %key, scope = %scope, "配置已写入");
        Ok(())
    }

    fn upsert_with(
        conn: &Connection,
        key: &str,
        scope: &ShopConstraint,
        value: &str,
        updated_at: &str,
    ) -> SqliteResult<usize> {
        conn.execute(
            r#"
            INSERT INTO configuration (key, scope_level, scope_id, value, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(key, scope_level, scope_id) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![
                key,
                scope.level().as_str(),
                stored_scope_id(scope),
                value,
                updated_at,
            ],
        )
    }

    /// 批量写入同一作用域下的配置（单事务）
    ///
    /// # 返回
    /// - 写入的配置项数量
    pub fn upsert_batch(
        &self,
        scope: &ShopConstraint,
        entries: &[(String, String)],
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let updated_at = now_string();
        let mut count = 0;
        for (key, value) in entries {
            count += Self::upsert_with(&tx, key, scope, value, &updated_at)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    /// 精确作用域查找配置值
    pub fn find_value(&self, key: &str, scope: &ShopConstraint) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                r#"
                SELECT value FROM configuration
                WHERE key = ?1 AND scope_level = ?2 AND scope_id = ?3
                "#,
                params![key, scope.level().as_str(), stored_scope_id(scope)],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 精确作用域查找配置实体
    pub fn find_entry(
        &self,
        key: &str,
        scope: &ShopConstraint,
    ) -> RepositoryResult<Option<ConfigurationEntity>> {
        let conn = self.get_conn()?;
        let entity = conn
            .query_row(
                r#"
                SELECT key, scope_level, scope_id, value, updated_at
                FROM configuration
                WHERE key = ?1 AND scope_level = ?2 AND scope_id = ?3
                "#,
                params![key, scope.level().as_str(), stored_scope_id(scope)],
                map_entity,
            )
            .optional()?;
        Ok(entity)
    }

    /// 列出某配置键在所有作用域上的值（具体作用域在前）
    pub fn list_by_key(&self, key: &str) -> RepositoryResult<Vec<ConfigurationEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT key, scope_level, scope_id, value, updated_at
            FROM configuration
            WHERE key = ?1
            ORDER BY
              CASE scope_level
                WHEN 'SHOP' THEN 0
                WHEN 'SHOP_GROUP' THEN 1
                ELSE 2
              END ASC,
              scope_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![key], map_entity)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 列出某作用域下精确存储的全部配置（按键排序）
    pub fn list_by_scope(&self, scope: &ShopConstraint) -> RepositoryResult<Vec<ConfigurationEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT key, scope_level, scope_id, value, updated_at
            FROM configuration
            WHERE scope_level = ?1 AND scope_id = ?2
            ORDER BY key ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![scope.level().as_str(), stored_scope_id(scope)],
                map_entity,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 配置项总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM configuration", [], |row| row.get(0))?;
        Ok(n)
    }
}

fn map_entity(row: &Row<'_>) -> SqliteResult<ConfigurationEntity> {
    let level_raw: String = row.get(1)?;
    let scope_level: ScopeLevel = level_raw
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
    let scope_id: i64 = row.get(2)?;

    Ok(ConfigurationEntity {
        key: row.get(0)?,
        scope_level,
        scope_id: match scope_level {
            ScopeLevel::AllShops => None,
            _ => Some(scope_id),
        },
        value: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_repo() -> ConfigurationRepository {
        ConfigurationRepository::new(":memory:").expect("Failed to create test repository")
    }

    #[test]
    fn test_upsert_and_find() {
        let repo = setup_test_repo();

        repo.upsert("PS_COLOR", &ShopConstraint::shop(2), "red").unwrap();

        let value = repo.find_value("PS_COLOR", &ShopConstraint::shop(2)).unwrap();
        assert_eq!(value.as_deref(), Some("red"));

        // 其他作用域不可见（仓储层不做继承）
        assert_eq!(repo.find_value("PS_COLOR", &ShopConstraint::shop(3)).unwrap(), None);
        assert_eq!(repo.find_value("PS_COLOR", &ShopConstraint::shop_group(2)).unwrap(), None);
    }

    #[test]
    fn test_upsert_overwrites() {
        let repo = setup_test_repo();
        let scope = ShopConstraint::all_shops();

        repo.upsert("PS_LANG", &scope, "en").unwrap();
        repo.upsert("PS_LANG", &scope, "fr").unwrap();

        assert_eq!(repo.find_value("PS_LANG", &scope).unwrap().as_deref(), Some("fr"));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_strict_flag_does_not_change_storage_slot() {
        let repo = setup_test_repo();

        repo.upsert("PS_STOCK", &ShopConstraint::shop(2).strict(), "1").unwrap();
        let value = repo.find_value("PS_STOCK", &ShopConstraint::shop(2)).unwrap();
        assert_eq!(value.as_deref(), Some("1"));
    }

    #[test]
    fn test_find_entry_all_shops_has_no_scope_id() {
        let repo = setup_test_repo();
        repo.upsert("PS_TAX", &ShopConstraint::all_shops(), "0").unwrap();

        let entry = repo
            .find_entry("PS_TAX", &ShopConstraint::all_shops())
            .unwrap()
            .expect("entry should exist");
        assert_eq!(entry.scope_level, ScopeLevel::AllShops);
        assert_eq!(entry.scope_id, None);
    }

    #[test]
    fn test_updated_at_matches_sqlite_utc_clock() {
        let repo = setup_test_repo();
        repo.upsert("PS_TZ", &ShopConstraint::all_shops(), "x").unwrap();

        let entry = repo
            .find_entry("PS_TZ", &ShopConstraint::all_shops())
            .unwrap()
            .expect("entry should exist");
        let db_now: String = {
            let conn = repo.get_conn().unwrap();
            conn.query_row("SELECT datetime('now')", [], |row| row.get(0)).unwrap()
        };

        let fmt = "%Y-%m-%d %H:%M:%S";
        let written = chrono::NaiveDateTime::parse_from_str(&entry.updated_at, fmt).unwrap();
        let sqlite = chrono::NaiveDateTime::parse_from_str(&db_now, fmt).unwrap();
        assert!((sqlite - written).num_seconds().abs() < 60, "{} vs {}", written, sqlite);
    }

    #[test]
    fn test_list_by_key_most_specific_first() {
        let repo = setup_test_repo();
        repo.upsert("k", &ShopConstraint::all_shops(), "all").unwrap();
        repo.upsert("k", &ShopConstraint::shop_group(1), "group").unwrap();
        repo.upsert("k", &ShopConstraint::shop(2), "shop").unwrap();

        let values: Vec<String> = repo
            .list_by_key("k")
            .unwrap()
            .into_iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(values, vec!["shop", "group", "all"]);
    }

    #[test]
    fn test_upsert_batch_and_list_by_scope() {
        let repo = setup_test_repo();
        let scope = ShopConstraint::shop_group(1);
        let entries = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];

        let written = repo.upsert_batch(&scope, &entries).unwrap();
        assert_eq!(written, 2);

        let keys: Vec<String> = repo
            .list_by_scope(&scope)
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(repo.list_by_scope(&ShopConstraint::all_shops()).unwrap().is_empty());
    }
}
