// ==========================================
// 多店铺配置存储 - 配置层
// ==========================================
// 职责: 作用域配置读写，支持 店铺 → 店铺组 → 全部店铺 继承
// 存储: configuration 表
// ==========================================

pub mod scoped_store;
pub mod settings;

// 重导出核心配置存储
pub use scoped_store::{config_keys, ScopedConfigurationStore};
pub use settings::StoreSettings;
