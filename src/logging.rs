// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 默认只放开本库的 info，宿主应用的其他依赖保持 warn
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 默认过滤器（未设置 RUST_LOG 时）
pub const DEFAULT_FILTER: &str = "warn,shop_config=info";

/// 测试过滤器：输出配置命中/未命中的 debug 日志
pub const TEST_FILTER: &str = "warn,shop_config=debug";

/// 构建过滤器：RUST_LOG 优先，缺失或非法时回退到 `fallback`
fn build_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: `DEFAULT_FILTER`）
///   例如: RUST_LOG=shop_config=trace
///
/// # 示例
/// ```no_run
/// use shop_config::logging;
/// logging::init();
/// ```
pub fn init() {
    fmt()
        .with_env_filter(build_filter(DEFAULT_FILTER))
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// 初始化测试环境的日志系统（可重复调用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(TEST_FILTER))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_parse() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        assert!(EnvFilter::try_new(TEST_FILTER).is_ok());
    }

    #[test]
    fn test_init_test_is_repeatable() {
        init_test();
        init_test();
        tracing::debug!(target: "shop_config", "日志已初始化");
    }
}
