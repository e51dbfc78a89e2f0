//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅者，默认级别 `info`，
//! 可以用 `RUST_LOG` 覆盖（例如 `RUST_LOG=tmc_driver=trace` 查看收发的原始字节）。
//! `log` 门面的记录通过 `tracing-log` 转发。

use tracing_subscriber::EnvFilter;

/// 日志初始化错误
pub type LoggerError = Box<dyn std::error::Error + Send + Sync>;

/// 以指定的默认过滤规则初始化日志
///
/// 已经初始化过时返回错误。
pub fn try_init_logger_with(default_directive: &str) -> Result<(), LoggerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

/// 初始化日志（默认 `info`），重复调用时忽略
pub fn init_logger() {
    init_logger_with("info");
}

pub fn init_logger_with(default_directive: &str) {
    let _ = try_init_logger_with(default_directive);
}

/// 初始化日志
///
/// ```rust
/// tmc_sdk::init_logger!();
/// tmc_sdk::init_logger!("tmc_driver=debug");
/// ```
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::logging::init_logger()
    };
    ($directive:expr) => {
        $crate::logging::init_logger_with($directive)
    };
}
