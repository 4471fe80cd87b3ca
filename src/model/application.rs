//! 应用模型及其推送配置

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::device::DeviceType;

/// 每种设备类型对应一份 Provider 配置
pub type PushSettings = HashMap<DeviceType, ProviderConfig>;

/// 应用（由外部存储创建和维护）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// 为 None 表示该应用没有配置任何推送 Provider
    #[serde(default)]
    pub push_settings: Option<PushSettings>,
}

impl Application {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            push_settings: None,
        }
    }

    pub fn with_provider(mut self, device_type: DeviceType, config: ProviderConfig) -> Self {
        self.push_settings
            .get_or_insert_with(HashMap::new)
            .insert(device_type, config);
        self
    }
}

/// Provider 配置（按 Provider 种类区分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    Apns(ApnsConfig),
    Fcm(FcmConfig),
    Mock(MockConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderConfig::Apns(_) => "apns",
            ProviderConfig::Fcm(_) => "fcm",
            ProviderConfig::Mock(_) => "mock",
        }
    }
}

/// APNs 配置（Token-based 认证，.p8 私钥）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApnsConfig {
    /// App Bundle ID（apns-topic）
    pub bundle_id: String,
    /// Apple Developer Team ID
    pub team_id: String,
    /// APNs Key ID
    pub key_id: String,
    /// PEM 格式私钥内容（与 private_key_path 二选一）
    #[serde(default)]
    pub private_key: Option<String>,
    /// 私钥文件路径（.p8 文件）
    #[serde(default)]
    pub private_key_path: Option<String>,
    /// true 使用生产环境，false 使用 sandbox
    #[serde(default)]
    pub production: bool,
}

/// FCM HTTP v1 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcmConfig {
    /// Firebase 项目 ID
    pub project_id: String,
    /// OAuth 2.0 access token（从 service account 获取）
    pub access_token: String,
}

/// Mock Provider 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockConfig {
    #[serde(default)]
    pub label: Option<String>,
}
