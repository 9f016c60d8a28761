use serde::{Deserialize, Serialize};

use crate::impl_default;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 未设置时使用）
    pub level: LogLevel,

    /// 输出源码目标（target）
    pub show_target: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    show_target: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 初始化日志系统
///
/// 配置tracing日志框架，优先使用`RUST_LOG`环境变量，
/// 否则使用配置中的级别。重复调用是安全的。
pub fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_target)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
        tracing::debug!(target: "config", "logging initialised twice");
    }

    #[test]
    fn test_level_filter_names() {
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
        assert_eq!(LoggingConfig::default().level, LogLevel::Info);
    }
}
