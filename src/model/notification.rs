//! 推送通知载荷
//!
//! 核心调度层不解析通知内容，原样交给 Provider，由 Provider 转换为各自的协议格式。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知优先级
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Normal,
    #[default]
    High,
}

/// 通知提醒文本
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// 推送通知
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub alert: Option<Alert>,
    #[serde(default)]
    pub badge: Option<u32>,
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// 静默推送（content-available）
    #[serde(default)]
    pub content_available: bool,
    /// 过期时间，过期后推送网络不再投递
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    /// 自定义数据，原样透传
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Notification {
    pub fn alert(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            alert: Some(Alert {
                title: Some(title.into()),
                body: Some(body.into()),
            }),
            ..Self::default()
        }
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.alert.as_ref().and_then(|a| a.title.as_deref())
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|t| t <= Utc::now()).unwrap_or(false)
    }
}
