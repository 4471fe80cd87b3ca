//! 设备模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 设备类型（决定使用哪个 Provider 以及哪份推送配置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// iOS / iPadOS / macOS（APNs）
    Ios,
    /// Android（FCM）
    Android,
    /// Web 浏览器
    Web,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Ios => "ios",
            DeviceType::Android => "android",
            DeviceType::Web => "web",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ios" | "apns" => Ok(DeviceType::Ios),
            "android" | "fcm" | "gcm" => Ok(DeviceType::Android),
            "web" => Ok(DeviceType::Web),
            other => Err(format!("unknown device type: {}", other)),
        }
    }
}

/// 设备注册信息（由外部存储创建和维护）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// 设备ID
    pub id: String,
    /// 所属应用ID
    pub app_id: String,
    /// 设备类型
    pub device_type: DeviceType,
    /// 推送令牌（由推送网络签发，仅在 Provider 范围内唯一）
    pub device_token: String,
    /// 用户ID
    #[serde(default)]
    pub user_id: Option<String>,
    /// 应用版本
    #[serde(default)]
    pub app_version: Option<String>,
    /// 设备状态（如 "active"）
    #[serde(default)]
    pub status: Option<String>,
    /// 订阅的主题
    #[serde(default)]
    pub subscriptions: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        app_id: impl Into<String>,
        device_type: DeviceType,
        device_token: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            app_id: app_id.into(),
            device_type,
            device_token: device_token.into(),
            user_id: None,
            app_version: None,
            status: None,
            subscriptions: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_subscriptions(mut self, subscriptions: Vec<String>) -> Self {
        self.subscriptions = subscriptions;
        self
    }
}

/// 设备查询条件
///
/// 所有已设置的字段都必须匹配；未设置任何字段时匹配全部设备。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub device_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// 设备订阅列表中包含该主题
    #[serde(default)]
    pub subscription: Option<String>,
}

impl DeviceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_token(token: impl Into<String>) -> Self {
        Self {
            device_token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn by_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, device: &Device) -> bool {
        fn eq_opt(expected: &Option<String>, actual: &Option<String>) -> bool {
            match expected {
                Some(v) => actual.as_deref() == Some(v.as_str()),
                None => true,
            }
        }

        if let Some(app_id) = &self.app_id {
            if &device.app_id != app_id {
                return false;
            }
        }
        if let Some(device_type) = self.device_type {
            if device.device_type != device_type {
                return false;
            }
        }
        if let Some(token) = &self.device_token {
            if &device.device_token != token {
                return false;
            }
        }
        if let Some(topic) = &self.subscription {
            if !device.subscriptions.iter().any(|s| s == topic) {
                return false;
            }
        }

        eq_opt(&self.user_id, &device.user_id)
            && eq_opt(&self.app_version, &device.app_version)
            && eq_opt(&self.status, &device.status)
    }
}
