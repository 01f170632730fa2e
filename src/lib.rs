// ==========================================
// 多店铺配置存储 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 店铺 / 店铺组 / 全部店铺 三级作用域配置
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 作用域与配置值
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 作用域配置存储
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{config_keys, ScopedConfigurationStore, StoreSettings};
pub use domain::{ConfigValue, ResolvedValue, ScopeLevel, ShopConstraint};
pub use repository::{
    ConfigurationEntity, ConfigurationRepository, NewShop, RepositoryError, RepositoryResult,
    ShopDirectory, ShopEntity, ShopRepository,
};

// ==========================================
// 常量定义
// ==========================================

// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
