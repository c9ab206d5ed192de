//! 配置管理模块
//!
//! 支持 TOML 配置文件分层加载与环境变量覆盖，缺省时全部字段都有可用默认值。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn is_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 规则引擎运行配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 规则集键
    pub rule_set_key: String,
    /// 事实形状名称，需在内置形状注册表中存在
    pub fact_shape: String,
    /// 规则目录 JSON 文件路径
    pub catalog_path: Option<String>,
    /// 待评估事实的 JSON 数组文件路径
    pub facts_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rule_set_key: "cpt".to_string(),
            fact_shape: "Encounter".to_string(),
            catalog_path: None,
            facts_path: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub observability: ObservabilityConfig,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "clause-rule-engine".to_string(),
            environment: "development".to_string(),
            observability: ObservabilityConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（CLAUSE_ 前缀，层级用 `__` 分隔，如 CLAUSE_ENGINE__RULE_SET_KEY -> engine.rule_set_key）
    ///
    /// 环境名取自 CLAUSE_ENV，配置目录取自 CONFIG_DIR。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from(Path::new(&config_dir), service_name)
    }

    /// 从指定目录加载，规则同 [`AppConfig::load`]
    pub fn load_from(config_dir: &Path, service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("CLAUSE_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("CLAUSE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("clause-config-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.engine.rule_set_key, "cpt");
        assert_eq!(config.engine.fact_shape, "Encounter");
        assert!(config.engine.catalog_path.is_none());
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.observability.is_json());
        assert!(!config.is_production());
    }

    #[test]
    fn test_load_without_files() {
        let dir = scratch_dir("empty");

        let config = AppConfig::load_from(&dir, "clause-rule-engine").unwrap();
        assert_eq!(config.service_name, "clause-rule-engine");
        assert_eq!(config.engine.fact_shape, "Encounter");
    }

    #[test]
    fn test_service_file_overrides_default_file() {
        let dir = scratch_dir("layered");
        std::fs::write(
            dir.join("default.toml"),
            "[engine]\nrule_set_key = \"base\"\ncatalog_path = \"config/catalog.json\"\n\n[observability]\nlog_format = \"json\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("layered-service.toml"),
            "[engine]\nrule_set_key = \"override\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&dir, "layered-service").unwrap();
        assert_eq!(config.engine.rule_set_key, "override");
        assert_eq!(config.engine.catalog_path.as_deref(), Some("config/catalog.json"));
        assert_eq!(config.engine.fact_shape, "Encounter");
        assert!(config.observability.is_json());
    }
}
