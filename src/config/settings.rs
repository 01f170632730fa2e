// ==========================================
// 多店铺配置存储 - 存储设置
// ==========================================
// 来源优先级: 环境变量 > 默认值
// ==========================================

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 数据库路径环境变量（便于调试/测试/CI）
pub const ENV_DB_PATH: &str = "SHOP_CONFIG_DB_PATH";

/// busy_timeout 环境变量（毫秒）
pub const ENV_BUSY_TIMEOUT_MS: &str = "SHOP_CONFIG_BUSY_TIMEOUT_MS";

/// 内存数据库路径
pub const IN_MEMORY_DB_PATH: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub db_path: String,      // SQLite 文件路径（或 :memory:）
    pub busy_timeout_ms: u64, // 并发写入等待时长
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreSettings {
    /// 内存库设置（测试用）
    pub fn in_memory() -> Self {
        Self {
            db_path: IN_MEMORY_DB_PATH.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// 从环境变量读取设置，缺失或非法时使用默认值
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                settings.db_path = trimmed.to_string();
            }
        }

        if let Ok(raw) = std::env::var(ENV_BUSY_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => settings.busy_timeout_ms = ms,
                Err(_) => {
                    tracing::warn!(
                        env = ENV_BUSY_TIMEOUT_MS,
                        raw_value = %raw,
                        "busy_timeout 配置格式错误，使用默认值"
                    );
                }
            }
        }

        settings
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY_DB_PATH
    }
}

/// 默认数据库路径
///
/// 优先使用用户数据目录，拿不到时回退到当前目录。
pub fn default_db_path() -> String {
    let path = match dirs::data_dir() {
        Some(data_dir) => data_dir.join("shop-config").join("shop_config.db"),
        None => PathBuf::from("./shop_config.db"),
    };
    path.to_string_lossy().into_owned()
}
