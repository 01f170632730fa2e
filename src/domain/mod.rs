// ==========================================
// 多店铺配置存储 - 领域层
// ==========================================
// 职责: 作用域约束、配置值等纯值类型
// 红线: 领域层不访问数据库
// ==========================================

pub mod config_value;
pub mod shop_constraint;

pub use config_value::{ConfigValue, ResolvedValue};
pub use shop_constraint::{ScopeLevel, ShopConstraint};
