/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和验证
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub mod logging;
pub mod particle;

pub use logging::{init_logging, LogLevel, LoggingConfig};
pub use particle::{ForceSettings, ParticleSystemConfig, SimulationSpace};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 按扩展名判断格式，未知扩展名按TOML处理
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// 从字符串解析配置
pub fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
    }
}

/// 序列化配置
pub fn to_string<T: Serialize>(value: &T, format: ConfigFormat) -> ConfigResult<String> {
    match format {
        ConfigFormat::Toml => {
            toml::to_string_pretty(value).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        ConfigFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| ConfigError::ParseError(e.to_string())),
    }
}

/// 从文件加载配置，格式由扩展名决定
pub fn load_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> ConfigResult<T> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_str(&content, ConfigFormat::from_path(path.as_ref()))
}

/// 保存配置到文件，格式由扩展名决定
pub fn save_file<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> ConfigResult<()> {
    let content = to_string(value, ConfigFormat::from_path(path.as_ref()))?;
    fs::write(path, content).map_err(ConfigError::FileError)
}

/// 无界面运行器的顶层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 粒子系统配置
    pub system: ParticleSystemConfig,

    /// 模拟帧数
    pub frames: u32,

    /// 每帧时间步长（秒）
    pub dt: f32,

    /// 日志配置
    pub logging: LoggingConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            system: ParticleSystemConfig::default(),
            frames: 600,
            dt: 1.0 / 60.0,
            logging: LoggingConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        parse_str(content, ConfigFormat::Toml)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        parse_str(content, ConfigFormat::Json)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "dt must be finite and > 0, got {}",
                self.dt
            )));
        }
        self.system.validate()
    }

    /// 加载配置文件；文件缺失或无效时使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let Some(path) = path else {
            tracing::info!(target: "config", "Using default runner configuration");
            return Self::default();
        };
        let path = path.as_ref();
        match load_file::<Self, _>(path).and_then(|config| config.validate().map(|_| config)) {
            Ok(mut config) => {
                tracing::info!(target: "config", "Loaded config from {:?}", path);
                config.system.apply_env_overrides();
                config
            }
            Err(e) => {
                tracing::warn!(target: "config", "Failed to load {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }
}

/// 读取并解析环境变量
pub(crate) fn env_override<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = env::var(key).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(target: "config", "Ignoring invalid value {:?} for {}", value, key);
            None
        }
    }
}
