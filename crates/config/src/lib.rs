//! clinic-config - 配置加载库
//!
//! 加载顺序: `{dir}/default.toml` → `{dir}/{APP_ENV}.toml` → `CLINIC_` 前缀环境变量
//! (嵌套字段用 `__` 分隔，例如 `CLINIC_DATABASE__URL`)。

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CLINIC_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// 单条语句超时 (毫秒)，0 表示不限制
    #[serde(default)]
    pub statement_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
    /// 安装 Prometheus recorder
    #[serde(default)]
    pub metrics: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            metrics: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_app_env() -> String {
    "development".to_string()
}

/// 构建配置源，服务可从中提取自己的配置段
pub fn load_figment(config_dir: &str) -> Figment {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

    Figment::new()
        .merge(Toml::file(format!("{}/default.toml", config_dir)))
        .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        Self::from_figment(&load_figment(config_dir))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

#[cfg(test)]
mod tests;
