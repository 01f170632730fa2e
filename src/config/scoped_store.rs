// ==========================================
// 多店铺配置存储 - 作用域配置存储
// ==========================================
// 读取: 店铺 → 店铺组 → 全部店铺，命中最具体作用域即返回
// strict: 仅在起始作用域判定一次，为 true 时不向上继承
// 写入: 只影响给定的精确作用域，strict 标记被忽略
// ==========================================

use crate::config::settings::StoreSettings;
use crate::db::{init_schema, open_sqlite_connection_with_timeout};
use crate::domain::{ConfigValue, ResolvedValue, ShopConstraint};
use crate::repository::configuration_repo::{ConfigurationEntity, ConfigurationRepository};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::shop_repo::{ShopDirectory, ShopRepository};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 多店铺功能开关（全部店铺作用域）
    pub const MULTISHOP_FEATURE_ACTIVE: &str = "PS_MULTISHOP_FEATURE_ACTIVE";
}

// ==========================================
// ScopedConfigurationStore - 作用域配置存储
// ==========================================
pub struct ScopedConfigurationStore<D: ShopDirectory = ShopRepository> {
    repo: ConfigurationRepository,
    directory: Arc<D>,
}

impl ScopedConfigurationStore<ShopRepository> {
    /// 按设置打开存储（配置表与店铺目录共用一个连接）
    pub fn open(settings: &StoreSettings) -> RepositoryResult<Self> {
        if !settings.is_in_memory() {
            if let Some(parent) = Path::new(&settings.db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::DatabaseConnectionError(format!(
                            "无法创建数据目录 {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
        }

        let conn = open_sqlite_connection_with_timeout(&settings.db_path, settings.busy_timeout_ms)?;
        tracing::info!(db_path = %settings.db_path, "打开配置存储");
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 使用环境变量设置打开存储
    pub fn open_from_env() -> RepositoryResult<Self> {
        Self::open(&StoreSettings::from_env())
    }

    /// 从已有连接创建（建表 + 写入 schema_version）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            init_schema(&guard)?;
        }

        let directory = Arc::new(ShopRepository::from_connection(conn.clone())?);
        let repo = ConfigurationRepository::from_connection(conn)?;
        Ok(Self::new(repo, directory))
    }
}

impl<D: ShopDirectory> ScopedConfigurationStore<D> {
    pub fn new(repo: ConfigurationRepository, directory: Arc<D>) -> Self {
        Self { repo, directory }
    }

    /// 店铺目录
    pub fn directory(&self) -> &D {
        &self.directory
    }

    // ===== 写入 =====

    /// 写入配置（精确作用域 Upsert，不做继承）
    ///
    /// # 错误
    /// - NotFound: 作用域引用的店铺/店铺组不存在
    pub fn set(&self, key: &str, value: &str, scope: ShopConstraint) -> RepositoryResult<()> {
        self.validate_scope(&scope)?;
        self.repo.upsert(key, &scope.with_strict(false), value)
    }

    // ===== 读取 =====

    /// 读取配置，继承链耗尽时原样返回 `default`
    ///
    /// # 示例
    /// ```no_run
    /// use shop_config::{ConfigValue, ScopedConfigurationStore, ShopConstraint, StoreSettings};
    ///
    /// let store = ScopedConfigurationStore::open(&StoreSettings::in_memory()).unwrap();
    /// let value = store
    ///     .get("PS_SHOP_NAME", None::<String>, ShopConstraint::all_shops())
    ///     .unwrap();
    /// assert_eq!(value, ConfigValue::Default(None));
    /// ```
    pub fn get<T>(&self, key: &str, default: T, scope: ShopConstraint) -> RepositoryResult<ConfigValue<T>> {
        Ok(match self.lookup(key, scope)? {
            Some(resolved) => ConfigValue::Stored(resolved.value),
            None => ConfigValue::Default(default),
        })
    }

    /// 不带默认值读取（等价于默认值 false）
    pub fn get_value(&self, key: &str, scope: ShopConstraint) -> RepositoryResult<ConfigValue<bool>> {
        self.get(key, false, scope)
    }

    /// 解析配置并返回命中的作用域
    pub fn lookup(&self, key: &str, scope: ShopConstraint) -> RepositoryResult<Option<ResolvedValue>> {
        for candidate in self.scope_chain(scope)? {
            if let Some(value) = self.repo.find_value(key, &candidate)? {
                tracing::debug!(key = %key, requested = %scope, found_at = %candidate, "配置命中");
                return Ok(Some(ResolvedValue {
                    value,
                    found_at: candidate,
                }));
            }
        }

        tracing::debug!(key = %key, requested = %scope, "配置未命中，使用默认值");
        Ok(None)
    }

    /// 回退链（由具体到宽泛），链上各层均为非 strict
    ///
    /// strict 作用域只包含自身。
    pub fn scope_chain(&self, scope: ShopConstraint) -> RepositoryResult<Vec<ShopConstraint>> {
        let start = scope.with_strict(false);
        let chain = match scope {
            ShopConstraint::Shop { shop_id, strict } => {
                let group_id = self.directory.group_of_shop(shop_id)?;
                if strict {
                    vec![start]
                } else {
                    vec![
                        start,
                        ShopConstraint::shop_group(group_id),
                        ShopConstraint::all_shops(),
                    ]
                }
            }
            ShopConstraint::ShopGroup { group_id, strict } => {
                self.ensure_group(group_id)?;
                if strict {
                    vec![start]
                } else {
                    vec![start, ShopConstraint::all_shops()]
                }
            }
            ShopConstraint::AllShops { .. } => vec![start],
        };
        Ok(chain)
    }

    /// 解析链上是否存在存储值
    pub fn has(&self, key: &str, scope: ShopConstraint) -> RepositoryResult<bool> {
        Ok(self.lookup(key, scope)?.is_some())
    }

    /// 读取布尔配置
    ///
    /// 存储值 "1"/"true"/"yes"/"on" 为 true，"0"/"false"/"no"/"off"/"" 为 false，
    /// 其他值告警并返回默认值。
    pub fn get_bool(&self, key: &str, default: bool, scope: ShopConstraint) -> RepositoryResult<bool> {
        let value = self.get(key, default, scope)?;
        Ok(value.map_stored(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                tracing::warn!(key = %key, raw_value = %raw, "布尔配置格式错误，使用默认值");
                default
            }
        }))
    }

    /// 读取整数配置，格式错误时告警并返回默认值
    pub fn get_i64(&self, key: &str, default: i64, scope: ShopConstraint) -> RepositoryResult<i64> {
        let value = self.get(key, default, scope)?;
        Ok(value.map_stored(|raw| {
            raw.trim().parse::<i64>().unwrap_or_else(|_| {
                tracing::warn!(key = %key, raw_value = %raw, "整数配置格式错误，使用默认值");
                default
            })
        }))
    }

    /// 多店铺功能是否开启
    pub fn is_multistore_active(&self) -> RepositoryResult<bool> {
        self.get_bool(
            config_keys::MULTISHOP_FEATURE_ACTIVE,
            false,
            ShopConstraint::all_shops(),
        )
    }

    /// 某配置键在所有作用域上的存储记录（具体作用域在前）
    pub fn entries_for_key(&self, key: &str) -> RepositoryResult<Vec<ConfigurationEntity>> {
        self.repo.list_by_key(key)
    }

    // ===== 快照 =====

    /// 导出精确作用域下的全部配置（JSON 对象，按键排序）
    pub fn snapshot(&self, scope: ShopConstraint) -> RepositoryResult<String> {
        self.validate_scope(&scope)?;
        let config_map: BTreeMap<String, String> = self
            .repo
            .list_by_scope(&scope.with_strict(false))?
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();
        Ok(serde_json::to_string(&config_map)?)
    }

    /// 从快照恢复配置到精确作用域（单事务，覆盖同名键）
    ///
    /// # 返回
    /// - 恢复的配置项数量
    pub fn restore_snapshot(&self, snapshot_json: &str, scope: ShopConstraint) -> RepositoryResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;
        self.validate_scope(&scope)?;

        let entries: Vec<(String, String)> = config_map.into_iter().collect();
        let count = self.repo.upsert_batch(&scope.with_strict(false), &entries)?;
        tracing::info!(scope = %scope, count, "配置快照已恢复");
        Ok(count)
    }

    // ===== 作用域校验 =====

    fn validate_scope(&self, scope: &ShopConstraint) -> RepositoryResult<()> {
        match *scope {
            ShopConstraint::Shop { shop_id, .. } => self.directory.group_of_shop(shop_id).map(|_| ()),
            ShopConstraint::ShopGroup { group_id, .. } => self.ensure_group(group_id),
            ShopConstraint::AllShops { .. } => Ok(()),
        }
    }

    fn ensure_group(&self, group_id: i64) -> RepositoryResult<()> {
        if self.directory.group_exists(group_id)? {
            Ok(())
        } else {
            Err(RepositoryError::not_found("shop_group", group_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::shop_repo::NewShop;

    /// 内存库：店铺组1 下有店铺1、店铺2；店铺组2 下有店铺3
    fn setup_store() -> ScopedConfigurationStore {
        let store = ScopedConfigurationStore::open(&StoreSettings::in_memory())
            .expect("Failed to open store");
        let shops = store.directory();
        let g1 = shops.create_shop_group("Default").unwrap();
        let g2 = shops.create_shop_group("Outlet").unwrap();
        shops.create_shop(&NewShop::new(g1, "shop_1")).unwrap();
        shops.create_shop(&NewShop::new(g1, "shop_2")).unwrap();
        shops.create_shop(&NewShop::new(g2, "shop_3")).unwrap();
        store
    }

    #[test]
    fn test_scope_chain_shop() {
        let store = setup_store();
        let chain = store.scope_chain(ShopConstraint::shop(2)).unwrap();
        assert_eq!(
            chain,
            vec![
                ShopConstraint::shop(2),
                ShopConstraint::shop_group(1),
                ShopConstraint::all_shops(),
            ]
        );
    }

    #[test]
    fn test_scope_chain_strict_is_single_non_strict_level() {
        let store = setup_store();
        assert_eq!(
            store.scope_chain(ShopConstraint::shop(3).strict()).unwrap(),
            vec![ShopConstraint::shop(3)]
        );
        assert_eq!(
            store.scope_chain(ShopConstraint::shop_group(2).strict()).unwrap(),
            vec![ShopConstraint::shop_group(2)]
        );
        assert_eq!(
            store.scope_chain(ShopConstraint::all_shops().strict()).unwrap(),
            vec![ShopConstraint::all_shops()]
        );
    }

    #[test]
    fn test_lookup_reports_found_scope() {
        let store = setup_store();
        store.set("k", "group", ShopConstraint::shop_group(1)).unwrap();

        let resolved = store.lookup("k", ShopConstraint::shop(2)).unwrap().unwrap();
        assert_eq!(resolved.value, "group");
        assert_eq!(resolved.found_at, ShopConstraint::shop_group(1));
    }

    #[test]
    fn test_group_value_not_visible_to_other_group() {
        let store = setup_store();
        store.set("k", "group1", ShopConstraint::shop_group(1)).unwrap();

        let value = store.get("k", "none", ShopConstraint::shop(3)).unwrap();
        assert_eq!(value, ConfigValue::Default("none"));
    }

    #[test]
    fn test_unknown_scope_propagates_not_found() {
        let store = setup_store();

        let err = store.get("k", false, ShopConstraint::shop(99)).unwrap_err();
        assert!(err.is_not_found());

        let err = store.get("k", false, ShopConstraint::shop_group(99)).unwrap_err();
        assert!(err.is_not_found());

        let err = store.set("k", "v", ShopConstraint::shop_group(99)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_get_bool_and_i64() {
        let store = setup_store();
        let all = ShopConstraint::all_shops();
        store.set("flag", "1", all).unwrap();
        store.set("count", "12", all).unwrap();
        store.set("broken", "maybe", all).unwrap();

        assert!(store.get_bool("flag", false, ShopConstraint::shop(1)).unwrap());
        assert!(store.get_bool("broken", true, all).unwrap());
        assert!(!store.get_bool("missing", false, all).unwrap());
        assert_eq!(store.get_i64("count", 0, ShopConstraint::shop_group(2)).unwrap(), 12);
        assert_eq!(store.get_i64("broken", 7, all).unwrap(), 7);
    }

    #[test]
    fn test_get_bool_accepts_word_spellings() {
        let store = setup_store();
        let all = ShopConstraint::all_shops();

        for raw in ["1", "true", "TRUE", "yes", "on", " On "] {
            store.set("flag", raw, all).unwrap();
            assert!(store.get_bool("flag", false, all).unwrap(), "raw: {:?}", raw);
        }
        for raw in ["0", "false", "no", "off", "OFF", ""] {
            store.set("flag", raw, all).unwrap();
            assert!(!store.get_bool("flag", true, all).unwrap(), "raw: {:?}", raw);
        }
    }

    #[test]
    fn test_multistore_flag() {
        let store = setup_store();
        assert!(!store.is_multistore_active().unwrap());

        store
            .set(config_keys::MULTISHOP_FEATURE_ACTIVE, "1", ShopConstraint::all_shops())
            .unwrap();
        assert!(store.is_multistore_active().unwrap());
    }

    #[test]
    fn test_snapshot_round_trip_between_shops() {
        let store = setup_store();
        store.set("a", "1", ShopConstraint::shop(1)).unwrap();
        store.set("b", "2", ShopConstraint::shop(1)).unwrap();

        let snapshot = store.snapshot(ShopConstraint::shop(1)).unwrap();
        assert_eq!(snapshot, r#"{"a":"1","b":"2"}"#);

        let restored = store.restore_snapshot(&snapshot, ShopConstraint::shop(3)).unwrap();
        assert_eq!(restored, 2);
        assert_eq!(
            store.get("b", None::<String>, ShopConstraint::shop(3).strict()).unwrap(),
            ConfigValue::Stored("2".to_string())
        );
    }

    #[test]
    fn test_restore_rejects_malformed_snapshot() {
        let store = setup_store();
        let err = store.restore_snapshot("[1, 2]", ShopConstraint::all_shops()).unwrap_err();
        assert!(matches!(err, RepositoryError::SerializationError(_)));
    }
}
