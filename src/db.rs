// ==========================================
// 多店铺配置存储 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键必须逐连接开启）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：建表均为 `CREATE TABLE IF NOT EXISTS`，这里的版本号只用于提示/告警。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// configuration 表（全部店铺作用域以 scope_id = 0 落库）
pub const CONFIGURATION_SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS configuration (
      key TEXT NOT NULL,
      scope_level TEXT NOT NULL
        CHECK (scope_level IN ('ALL_SHOPS', 'SHOP_GROUP', 'SHOP')),
      scope_id INTEGER NOT NULL DEFAULT 0,
      value TEXT NOT NULL,
      updated_at TEXT NOT NULL DEFAULT (datetime('now')),
      PRIMARY KEY (key, scope_level, scope_id)
    );

    CREATE INDEX IF NOT EXISTS idx_configuration_scope
      ON configuration(scope_level, scope_id);
    "#;

/// 店铺组 / 店铺层级表
pub const SHOP_SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS shop_group (
      group_id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS shop (
      shop_id INTEGER PRIMARY KEY AUTOINCREMENT,
      group_id INTEGER NOT NULL,
      name TEXT NOT NULL,
      active INTEGER NOT NULL DEFAULT 1,
      created_at TEXT NOT NULL DEFAULT (datetime('now')),
      FOREIGN KEY (group_id) REFERENCES shop_group(group_id) ON DELETE RESTRICT
    );

    CREATE INDEX IF NOT EXISTS idx_shop_group
      ON shop(group_id);
    "#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection_with_timeout(
    conn: &Connection,
    busy_timeout_ms: u64,
) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    open_sqlite_connection_with_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS)
}

pub fn open_sqlite_connection_with_timeout(
    db_path: &str,
    busy_timeout_ms: u64,
) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection_with_timeout(&conn, busy_timeout_ms)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 写入当前 schema_version（幂等）
///
/// 若库中版本高于当前代码，仅告警不降级。
pub fn stamp_schema_version(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    match read_schema_version(conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                code_version = CURRENT_SCHEMA_VERSION,
                "数据库 schema_version 高于当前代码版本"
            );
        }
        Some(v) if v == CURRENT_SCHEMA_VERSION => {}
        _ => {
            conn.execute(
                "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
                [CURRENT_SCHEMA_VERSION],
            )?;
        }
    }
    Ok(())
}

/// 初始化全部表结构并写入 schema_version（幂等）
///
/// 各仓储独立打开时也会执行各自的建表语句，这里用于共用连接的一次性初始化。
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SHOP_SCHEMA_SQL)?;
    conn.execute_batch(CONFIGURATION_SCHEMA_SQL)?;
    stamp_schema_version(conn)
}
