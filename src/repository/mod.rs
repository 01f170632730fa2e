// ==========================================
// 多店铺配置存储 - 数据仓储层
// ==========================================
// 红线: Repository 不含继承逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod configuration_repo;
pub mod error;
pub mod shop_repo;

// 重导出核心仓储
pub use configuration_repo::{ConfigurationEntity, ConfigurationRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use shop_repo::{NewShop, ShopDirectory, ShopEntity, ShopRepository};
