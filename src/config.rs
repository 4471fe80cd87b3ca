use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "privchat-push.toml";

/// 推送调度配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub events: EventsConfig,
    pub providers: ProvidersConfig,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    /// compact, pretty, json
    pub format: Option<String>,
    /// 日志文件路径（不设置则输出到 stdout）
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
            file: None,
        }
    }
}

/// 存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// PostgreSQL 连接字符串（backend = "postgres" 时必填）
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// 内存存储的种子数据（JSON）
    pub seed_file: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            max_connections: 10,
            seed_file: None,
        }
    }
}

/// 事件通道配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// 错误通道缓冲区大小
    pub error_channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            error_channel_capacity: 1024,
        }
    }
}

/// Provider 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// 是否允许应用使用 Mock Provider
    pub allow_mock: bool,
    /// 批量推送时同时进行的 Provider 解析数（每个解析都要查询一次应用）
    pub resolve_concurrency: usize,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            allow_mock: true,
            resolve_concurrency: 8,
        }
    }
}

impl PushConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("无法读取配置文件: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "配置文件格式错误")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("配置序列化失败")
    }

    /// 从环境变量合并（PRIVCHAT_PUSH_ 前缀）
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(level) = env::var("PRIVCHAT_PUSH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("PRIVCHAT_PUSH_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
        if let Ok(backend) = env::var("PRIVCHAT_PUSH_STORE") {
            self.store.backend = match backend.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" | "postgresql" => StoreBackend::Postgres,
                other => bail!("未知的存储后端: {}", other),
            };
        }
        if let Ok(db_url) = env::var("DATABASE_URL") {
            self.store.database_url = Some(db_url);
        }
        if let Ok(seed) = env::var("PRIVCHAT_PUSH_SEED_FILE") {
            self.store.seed_file = Some(seed);
        }
        if let Ok(allow) = env::var("PRIVCHAT_PUSH_ALLOW_MOCK") {
            self.providers.allow_mock = allow
                .parse()
                .with_context(|| format!("PRIVCHAT_PUSH_ALLOW_MOCK 不是布尔值: {}", allow))?;
        }
        Ok(())
    }

    /// 从命令行参数合并（最高优先级）
    pub fn merge_from_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(level) = cli.get_log_level() {
            self.logging.level = level;
        }
        if let Some(format) = &cli.log_format {
            self.logging.format = Some(format.clone());
        }
        if let Some(file) = &cli.log_file {
            self.logging.file = Some(file.clone());
        }
        if let Some(url) = &cli.database_url {
            self.store.backend = StoreBackend::Postgres;
            self.store.database_url = Some(url.clone());
        }
        if let Some(seed) = &cli.seed_file {
            self.store.seed_file = Some(seed.clone());
        }
    }

    /// 加载配置（优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    pub fn load(cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = match &cli.config_file {
            Some(path) if Path::new(path).exists() => {
                info!("📄 从配置文件加载: {}", path);
                Self::from_toml_file(path)?
            }
            Some(path) => {
                warn!("⚠️ 配置文件不存在: {}", path);
                Self::default()
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                info!("📄 从默认配置文件加载: {}", DEFAULT_CONFIG_FILE);
                Self::from_toml_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        config.merge_from_env()?;
        config.merge_from_cli(cli);
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Postgres && self.store.database_url.is_none() {
            bail!("store.backend = \"postgres\" 需要配置 store.database_url 或 DATABASE_URL");
        }
        if self.store.max_connections == 0 {
            bail!("store.max_connections 必须大于 0");
        }
        if self.events.error_channel_capacity == 0 {
            bail!("events.error_channel_capacity 必须大于 0");
        }
        if self.providers.resolve_concurrency == 0 {
            bail!("providers.resolve_concurrency 必须大于 0");
        }
        Ok(())
    }
}

/// 仅读取配置文件中的 [logging] 段，用于在完整加载配置前初始化日志
pub fn load_early_logging_config(config_file: Option<&str>) -> LoggingConfig {
    #[derive(Deserialize, Default)]
    struct EarlyConfig {
        #[serde(default)]
        logging: LoggingConfig,
    }

    let path = config_file.unwrap_or(DEFAULT_CONFIG_FILE);
    fs::read_to_string(path)
        .ok()
        .and_then(|content| toml::from_str::<EarlyConfig>(&content).ok())
        .map(|c| c.logging)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PushConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.events.error_channel_capacity, 1024);
        assert!(config.providers.allow_mock);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = PushConfig::from_toml_str(
            r#"
            [store]
            backend = "postgres"
            database_url = "postgres://localhost/push"

            [providers]
            allow_mock = false
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.max_connections, 10);
        assert!(!config.providers.allow_mock);
        assert_eq!(config.providers.resolve_concurrency, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_postgres_without_url() {
        let mut config = PushConfig::default();
        config.store.backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());

        let mut config = PushConfig::default();
        config.events.error_channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = PushConfig::default();
        config.providers.resolve_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PushConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(PushConfig::from_toml_str(&text).unwrap(), config);
    }
}
