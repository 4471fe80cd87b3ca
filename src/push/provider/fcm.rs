use crate::error::{PushError, Result};
use crate::model::{DeviceType, FcmConfig, Notification, NotificationPriority};
use crate::push::provider::provider_trait::PushProvider;
use crate::push::provider::EventEmitter;
use crate::push::types::ProviderEvent;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// FCM (Firebase Cloud Messaging) Provider
///
/// 使用 FCM HTTP v1 API
pub struct FcmProvider {
    client: Client,
    device_type: DeviceType,
    project_id: String,
    access_token: String, // OAuth 2.0 access token
    events: EventEmitter,
}

impl FcmProvider {
    /// 创建新的 FCM Provider
    pub fn new(device_type: DeviceType, config: &FcmConfig) -> Result<Self> {
        if config.project_id.is_empty() || config.access_token.is_empty() {
            return Err(PushError::InvalidRequest(
                "FCM config requires project_id and access_token".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            device_type,
            project_id: config.project_id.clone(),
            access_token: config.access_token.clone(),
            events: EventEmitter::new(),
        })
    }
}

/// 构建 FCM 消息 payload
///
/// FCM 的 data 字段只接受字符串值，非字符串值序列化为 JSON 文本。
pub(crate) fn build_fcm_payload(notification: &Notification, token: &str) -> serde_json::Value {
    let data: serde_json::Map<String, serde_json::Value> = notification
        .data
        .iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), serde_json::Value::String(value))
        })
        .collect();

    let priority = match notification.priority {
        Some(NotificationPriority::Normal) => "normal",
        _ => "high",
    };

    let mut android = json!({ "priority": priority });
    if let Some(expires_at) = notification.expires_at {
        let ttl = (expires_at - Utc::now()).num_seconds().max(0);
        android["ttl"] = json!(format!("{}s", ttl));
    }

    let mut message = json!({
        "token": token,
        "data": data,
        "android": android,
    });
    if let Some(alert) = &notification.alert {
        message["notification"] = json!({ "title": alert.title, "body": alert.body });
    }

    json!({ "message": message })
}

/// FCM 错误响应中表示令牌失效的状态
fn is_unregistered(status: StatusCode, body: &serde_json::Value) -> bool {
    if status == StatusCode::NOT_FOUND {
        return true;
    }
    let error_status = body["error"]["status"].as_str().unwrap_or_default();
    if error_status == "UNREGISTERED" || error_status == "NOT_FOUND" {
        return true;
    }
    // INVALID_ARGUMENT 也用于其他字段错误，只有明确提到 token 时才视为失效
    error_status == "INVALID_ARGUMENT"
        && body["error"]["message"]
            .as_str()
            .map(|m| m.contains("registration token"))
            .unwrap_or(false)
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn push(&self, notification: &Notification, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(PushError::InvalidRequest("empty FCM registration token".to_string()));
        }
        if notification.is_expired() {
            return Err(PushError::InvalidRequest("notification already expired".to_string()));
        }

        let url = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            self.project_id
        );
        let payload = build_fcm_payload(notification, token);

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&payload);

        let events = self.events.clone();
        let token = token.to_string();

        tokio::spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    error!("[FCM] Request failed: token={}, error={}", token, e);
                    events.emit(ProviderEvent::Error(PushError::provider(
                        "fcm",
                        format!("FCM request failed: {}", e),
                    )));
                    return;
                }
            };

            let status = response.status();
            if status.is_success() {
                info!("[FCM] Push sent successfully: token={}", token);
                return;
            }

            let error_text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<serde_json::Value>(&error_text)
                .unwrap_or(serde_json::Value::Null);

            if is_unregistered(status, &body) {
                warn!("[FCM] Registration token rejected: token={}, status={}", token, status);
                events.emit(ProviderEvent::InvalidTokens(vec![token]));
            } else {
                error!(
                    "[FCM] Push failed: token={}, status={}, error={}",
                    token, status, error_text
                );
                events.emit(ProviderEvent::Error(PushError::provider(
                    "fcm",
                    format!("FCM push failed: status={}, error={}", status, error_text),
                )));
            }
        });

        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}
