use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cadlink_core::units::LengthUnit;
use serde::{Deserialize, Deserializer, de};
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default)]
    pub interchange: InterchangeConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `CADLINK_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("CADLINK_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let conversion = &self.conversion;
        let tolerance = conversion.geometry_tolerance;
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "geometry_tolerance 必须为正数，当前为 {tolerance}"
            )));
        }
        if conversion.default_font.trim().is_empty() {
            return Err(ConfigError::Invalid("default_font 不能为空".to_string()));
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 两端文档单位。`fallback` 用于补全未设置单位的一侧。
#[derive(Debug, Clone, Deserialize)]
pub struct UnitsConfig {
    #[serde(default, deserialize_with = "length_unit")]
    pub source: LengthUnit,
    #[serde(default, deserialize_with = "length_unit")]
    pub target: LengthUnit,
    #[serde(default = "UnitsConfig::default_fallback", deserialize_with = "length_unit")]
    pub fallback: LengthUnit,
}

impl UnitsConfig {
    fn default_fallback() -> LengthUnit {
        LengthUnit::Millimeters
    }
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            source: LengthUnit::Unset,
            target: LengthUnit::Unset,
            fallback: Self::default_fallback(),
        }
    }
}

/// 接受缩写或全名，例如 `"mm"`、`"inches"`。
fn length_unit<'de, D>(deserializer: D) -> Result<LengthUnit, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    LengthUnit::parse(&raw).ok_or_else(|| de::Error::custom(format!("未知长度单位 `{raw}`")))
}

/// 实体文件往返所用的交换目录。`root` 为空时位于系统临时目录下。
#[derive(Debug, Clone, Deserialize)]
pub struct InterchangeConfig {
    #[serde(default = "InterchangeConfig::default_subdir")]
    pub temp_subdir: String,
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl InterchangeConfig {
    fn default_subdir() -> String {
        "cadlink/interchange".to_string()
    }

    /// 交换目录的实际位置。
    pub fn resolved_root(&self) -> PathBuf {
        match &self.root {
            Some(root) => root.clone(),
            None => env::temp_dir().join(&self.temp_subdir),
        }
    }
}

impl Default for InterchangeConfig {
    fn default() -> Self {
        Self {
            temp_subdir: Self::default_subdir(),
            root: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    #[serde(default = "ConversionConfig::default_geometry_tolerance")]
    pub geometry_tolerance: f64,
    #[serde(default = "ConversionConfig::default_font")]
    pub default_font: String,
}

impl ConversionConfig {
    fn default_geometry_tolerance() -> f64 {
        1e-6
    }

    fn default_font() -> String {
        "Arial".to_string()
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            geometry_tolerance: Self::default_geometry_tolerance(),
            default_font: Self::default_font(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置无效: {0}")]
    Invalid(String),
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
