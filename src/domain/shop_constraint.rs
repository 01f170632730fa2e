// ==========================================
// 多店铺配置存储 - 作用域约束
// ==========================================
// 层级: 店铺 (SHOP) → 店铺组 (SHOP_GROUP) → 全部店铺 (ALL_SHOPS)
// strict: 仅影响读取，是否允许向上继承
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 作用域层级 (Scope Level)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeLevel {
    AllShops,  // 全部店铺
    ShopGroup, // 店铺组
    Shop,      // 单店铺
}

impl ScopeLevel {
    /// 数据库存储值
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeLevel::AllShops => "ALL_SHOPS",
            ScopeLevel::ShopGroup => "SHOP_GROUP",
            ScopeLevel::Shop => "SHOP",
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALL_SHOPS" => Ok(ScopeLevel::AllShops),
            "SHOP_GROUP" => Ok(ScopeLevel::ShopGroup),
            "SHOP" => Ok(ScopeLevel::Shop),
            other => Err(format!("未知的作用域层级: {}", other)),
        }
    }
}

// ==========================================
// ShopConstraint - 作用域约束
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShopConstraint {
    AllShops {
        #[serde(default)]
        strict: bool,
    },
    ShopGroup {
        group_id: i64,
        #[serde(default)]
        strict: bool,
    },
    Shop {
        shop_id: i64,
        #[serde(default)]
        strict: bool,
    },
}

impl ShopConstraint {
    pub fn all_shops() -> Self {
        ShopConstraint::AllShops { strict: false }
    }

    pub fn shop_group(group_id: i64) -> Self {
        ShopConstraint::ShopGroup {
            group_id,
            strict: false,
        }
    }

    pub fn shop(shop_id: i64) -> Self {
        ShopConstraint::Shop {
            shop_id,
            strict: false,
        }
    }

    /// 返回同一作用域的 strict 版本（禁止继承）
    pub fn strict(self) -> Self {
        self.with_strict(true)
    }

    pub fn with_strict(self, strict: bool) -> Self {
        match self {
            ShopConstraint::AllShops { .. } => ShopConstraint::AllShops { strict },
            ShopConstraint::ShopGroup { group_id, .. } => {
                ShopConstraint::ShopGroup { group_id, strict }
            }
            ShopConstraint::Shop { shop_id, .. } => ShopConstraint::Shop { shop_id, strict },
        }
    }

    pub fn level(&self) -> ScopeLevel {
        match self {
            ShopConstraint::AllShops { .. } => ScopeLevel::AllShops,
            ShopConstraint::ShopGroup { .. } => ScopeLevel::ShopGroup,
            ShopConstraint::Shop { .. } => ScopeLevel::Shop,
        }
    }

    /// 作用域ID（全部店铺为 None）
    pub fn scope_id(&self) -> Option<i64> {
        match self {
            ShopConstraint::AllShops { .. } => None,
            ShopConstraint::ShopGroup { group_id, .. } => Some(*group_id),
            ShopConstraint::Shop { shop_id, .. } => Some(*shop_id),
        }
    }

    pub fn is_strict(&self) -> bool {
        match self {
            ShopConstraint::AllShops { strict }
            | ShopConstraint::ShopGroup { strict, .. }
            | ShopConstraint::Shop { strict, .. } => *strict,
        }
    }
}

impl Default for ShopConstraint {
    fn default() -> Self {
        ShopConstraint::all_shops()
    }
}

impl fmt::Display for ShopConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.is_strict() { ",strict" } else { "" };
        match self.scope_id() {
            Some(id) => write!(f, "{}({}{})", self.level(), id, suffix),
            None if self.is_strict() => write!(f, "{}(strict)", self.level()),
            None => write!(f, "{}", self.level()),
        }
    }
}
