//! 服务配置
//!
//! 通用段 (`app_name`/`database`/`telemetry`) 由 clinic-config 解析，
//! 本服务只额外读取 `[access]` 段。

use clinic_config::{AppConfig, ConfigError, load_figment};
use figment::Figment;
use serde::Deserialize;

use crate::domain::archetype::ArchetypeRules;

/// 审计输出方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// 写入 `audit` target 的结构化日志
    #[default]
    Tracing,
    Disabled,
}

/// `[access]` 配置段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub archetypes: ArchetypeRules,
    #[serde(default)]
    pub audit: AuditMode,
}

#[derive(Debug, Default, Deserialize)]
struct Sections {
    #[serde(default)]
    access: AccessConfig,
}

/// Role Access 服务配置
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub app: AppConfig,
    pub access: AccessConfig,
}

impl ServiceConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        Self::from_figment(&load_figment(config_dir))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let app = AppConfig::from_figment(figment)?;
        let Sections { access } = figment.extract()?;
        Ok(Self { app, access })
    }
}
