// ==========================================
// 多店铺配置存储 - 店铺目录仓储
// ==========================================
// 职责: 店铺 / 店铺组层级 (shop_group, shop 表)
// 说明: 配置存储只读取该层级（店铺 → 所属店铺组），从不修改
// ==========================================

use crate::db::{open_sqlite_connection, SHOP_SCHEMA_SQL};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// ShopDirectory Trait - 店铺层级查询接口
// ==========================================
pub trait ShopDirectory: Send + Sync {
    /// 查询店铺所属店铺组
    ///
    /// # 错误
    /// - NotFound: 店铺不存在
    fn group_of_shop(&self, shop_id: i64) -> RepositoryResult<i64>;

    /// 店铺组是否存在
    fn group_exists(&self, group_id: i64) -> RepositoryResult<bool>;
}

/// 店铺实体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopEntity {
    pub shop_id: i64,
    pub group_id: i64,
    pub name: String,
    pub active: bool,
}

/// 新建店铺参数
#[derive(Debug, Clone)]
pub struct NewShop {
    pub group_id: i64,
    pub name: String,
    pub active: bool,
}

impl NewShop {
    pub fn new(group_id: i64, name: impl Into<String>) -> Self {
        Self {
            group_id,
            name: name.into(),
            active: true,
        }
    }
}

pub struct ShopRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ShopRepository {
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
        conn.execute_batch(SHOP_SCHEMA_SQL)?;
        Ok(())
    }

    /// 创建店铺组，返回新ID
    pub fn create_shop_group(&self, name: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute("INSERT INTO shop_group (name) VALUES (?1)", params![name])?;
        let group_id = conn.last_insert_rowid();
        tracing::info!(group_id, name = %name, "店铺组已创建");
        Ok(group_id)
    }

    /// 创建店铺，返回新ID
    ///
    /// 所属店铺组必须已存在（外键约束）
    pub fn create_shop(&self, shop: &NewShop) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO shop (group_id, name, active) VALUES (?1, ?2, ?3)",
            params![shop.group_id, shop.name, shop.active],
        )?;
        let shop_id = conn.last_insert_rowid();
        tracing::info!(shop_id, group_id = shop.group_id, name = %shop.name, "店铺已创建");
        Ok(shop_id)
    }

    pub fn find_shop(&self, shop_id: i64) -> RepositoryResult<Option<ShopEntity>> {
        let conn = self.get_conn()?;
        let shop = conn
            .query_row(
                "SELECT shop_id, group_id, name, active FROM shop WHERE shop_id = ?1",
                params![shop_id],
                |row| {
                    Ok(ShopEntity {
                        shop_id: row.get(0)?,
                        group_id: row.get(1)?,
                        name: row.get(2)?,
                        active: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(shop)
    }

    /// 列出店铺组下的店铺（按ID排序）
    pub fn list_shops_in_group(&self, group_id: i64) -> RepositoryResult<Vec<ShopEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT shop_id, group_id, name, active
            FROM shop
            WHERE group_id = ?1
            ORDER BY shop_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![group_id], |row| {
                Ok(ShopEntity {
                    shop_id: row.get(0)?,
                    group_id: row.get(1)?,
                    name: row.get(2)?,
                    active: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

impl ShopDirectory for ShopRepository {
    fn group_of_shop(&self, shop_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let group_id = conn
            .query_row(
                "SELECT group_id FROM shop WHERE shop_id = ?1",
                params![shop_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        group_id.ok_or_else(|| RepositoryError::not_found("shop", shop_id))
    }

    fn group_exists(&self, group_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM shop_group WHERE group_id = ?1",
                params![group_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }
}
