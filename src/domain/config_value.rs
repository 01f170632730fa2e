// ==========================================
// 多店铺配置存储 - 配置读取结果
// ==========================================

use crate::domain::shop_constraint::ShopConstraint;

/// 配置读取结果
///
/// 默认值原样返回，不做类型转换；`Option<String>` 的 `None` 即空默认值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue<D> {
    Stored(String), // 命中存储值
    Default(D),     // 继承链耗尽，返回调用方默认值
}

impl<D> ConfigValue<D> {
    pub fn is_default(&self) -> bool {
        matches!(self, ConfigValue::Default(_))
    }

    /// 命中时转换存储值，否则保留默认值
    pub fn map_stored<F>(self, f: F) -> D
    where
        F: FnOnce(String) -> D,
    {
        match self {
            ConfigValue::Stored(v) => f(v),
            ConfigValue::Default(d) => d,
        }
    }
}

impl ConfigValue<Option<String>> {
    /// 折叠为 Option（存储值优先）
    pub fn into_option(self) -> Option<String> {
        match self {
            ConfigValue::Stored(v) => Some(v),
            ConfigValue::Default(d) => d,
        }
    }
}

/// 带来源作用域的解析结果（用于审计继承优先级）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub found_at: ShopConstraint, // 命中的作用域
}
