use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::EventEmitter;
use crate::error::{PushError, Result};
use crate::model::{ApnsConfig, DeviceType, Notification, NotificationPriority};
use crate::push::provider::provider_trait::PushProvider;
use crate::push::types::ProviderEvent;

const PRODUCTION_HOST: &str = "https://api.push.apple.com";
const SANDBOX_HOST: &str = "https://api.sandbox.push.apple.com";

/// APNs 要求 JWT 在 20~60 分钟内刷新
const JWT_REFRESH_AFTER: Duration = Duration::from_secs(50 * 60);

/// 这些 reason 表示令牌永久失效，需要清理设备
const INVALID_TOKEN_REASONS: &[&str] = &["BadDeviceToken", "Unregistered", "DeviceTokenNotForTopic"];

/// APNs (Apple Push Notification service) Provider
///
/// 使用 APNs HTTP/2 API，Token-based 认证。
pub struct ApnsProvider {
    client: Client,
    device_type: DeviceType,
    host: &'static str,
    bundle_id: String,
    team_id: String,
    key_id: String,
    private_key: EncodingKey,
    jwt: Mutex<Option<(String, Instant)>>,
    events: EventEmitter,
}

impl ApnsProvider {
    /// 创建新的 APNs Provider
    ///
    /// 私钥优先使用配置中的 PEM 内容，否则读取 `private_key_path`（.p8 文件）
    pub fn new(device_type: DeviceType, config: &ApnsConfig) -> Result<Self> {
        let pem = match (&config.private_key, &config.private_key_path) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                PushError::InvalidRequest(format!("Failed to read APNs private key: {}", e))
            })?,
            (None, None) => {
                return Err(PushError::InvalidRequest(
                    "APNs config requires private_key or private_key_path".to_string(),
                ))
            }
        };

        let private_key = EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| {
            PushError::InvalidRequest(format!("Failed to parse APNs private key: {}", e))
        })?;

        Ok(Self {
            client: Client::new(),
            device_type,
            host: if config.production { PRODUCTION_HOST } else { SANDBOX_HOST },
            bundle_id: config.bundle_id.clone(),
            team_id: config.team_id.clone(),
            key_id: config.key_id.clone(),
            private_key,
            jwt: Mutex::new(None),
            events: EventEmitter::new(),
        })
    }

    /// 获取 APNs JWT Token，过期前复用
    fn jwt_token(&self) -> Result<String> {
        let mut cached = self.jwt.lock();
        if let Some((token, issued_at)) = cached.as_ref() {
            if issued_at.elapsed() < JWT_REFRESH_AFTER {
                return Ok(token.clone());
            }
        }

        let claims = json!({
            "iss": self.team_id,
            "iat": Utc::now().timestamp(),
        });
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let token = encode(&header, &claims, &self.private_key)
            .map_err(|e| PushError::Internal(format!("Failed to generate APNs JWT: {}", e)))?;
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// 构建 APNs 消息 payload；自定义数据放在 aps 之外的顶层
pub(crate) fn build_apns_payload(notification: &Notification) -> serde_json::Value {
    let mut aps = serde_json::Map::new();
    if let Some(alert) = &notification.alert {
        aps.insert(
            "alert".to_string(),
            json!({ "title": alert.title, "body": alert.body }),
        );
    }
    if let Some(badge) = notification.badge {
        aps.insert("badge".to_string(), json!(badge));
    }
    if let Some(sound) = &notification.sound {
        aps.insert("sound".to_string(), json!(sound));
    }
    if let Some(category) = &notification.category {
        aps.insert("category".to_string(), json!(category));
    }
    if notification.content_available {
        aps.insert("content-available".to_string(), json!(1));
    }

    let mut payload = notification.data.clone();
    payload.insert("aps".to_string(), serde_json::Value::Object(aps));
    serde_json::Value::Object(payload)
}

fn is_background(notification: &Notification) -> bool {
    notification.content_available && notification.alert.is_none()
}

#[async_trait]
impl PushProvider for ApnsProvider {
    async fn push(&self, notification: &Notification, token: &str) -> Result<()> {
        if !is_valid_token(token) {
            return Err(PushError::InvalidRequest(format!(
                "malformed APNs device token: {}",
                token
            )));
        }
        if notification.is_expired() {
            return Err(PushError::InvalidRequest("notification already expired".to_string()));
        }

        let jwt_token = self.jwt_token()?;
        let url = format!("{}/3/device/{}", self.host, token);
        let payload = build_apns_payload(notification);

        // 静默推送必须使用优先级 5
        let (push_type, priority) = if is_background(notification) {
            ("background", "5")
        } else if notification.priority == Some(NotificationPriority::Normal) {
            ("alert", "5")
        } else {
            ("alert", "10")
        };

        let mut request = self
            .client
            .post(&url)
            .header("authorization", format!("bearer {}", jwt_token))
            .header("apns-topic", &self.bundle_id)
            .header("apns-priority", priority)
            .header("apns-push-type", push_type)
            .json(&payload);
        if let Some(expires_at) = notification.expires_at {
            request = request.header("apns-expiration", expires_at.timestamp().to_string());
        }

        let events = self.events.clone();
        let token = token.to_string();

        debug!("[APNs] Push accepted: token={}", token);

        tokio::spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    error!("[APNs] Request failed: token={}, error={}", token, e);
                    events.emit(ProviderEvent::Error(PushError::provider(
                        "apns",
                        format!("APNs request failed: {}", e),
                    )));
                    return;
                }
            };

            let status = response.status();
            if status.is_success() {
                info!("[APNs] Push sent successfully: token={}", token);
                return;
            }

            let error_text = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<serde_json::Value>(&error_text)
                .ok()
                .and_then(|v| v.get("reason").and_then(|r| r.as_str()).map(str::to_string));

            let token_invalid = status == StatusCode::GONE
                || reason
                    .as_deref()
                    .map(|r| INVALID_TOKEN_REASONS.contains(&r))
                    .unwrap_or(false);

            if token_invalid {
                warn!(
                    "[APNs] Device token rejected: token={}, status={}, reason={:?}",
                    token, status, reason
                );
                events.emit(ProviderEvent::InvalidTokens(vec![token]));
            } else {
                error!(
                    "[APNs] Push failed: token={}, status={}, error={}",
                    token, status, error_text
                );
                let message = match reason {
                    Some(reason) => format!("APNs error: {} ({})", reason, status),
                    None => format!("APNs push failed: status={}, error={}", status, error_text),
                };
                events.emit(ProviderEvent::Error(PushError::provider("apns", message)));
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
        "apns"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_apns_payload() {
        let notification = Notification::alert("Hello", "World")
            .with_badge(3)
            .with_data("conversation_id", json!("42"));

        let payload = build_apns_payload(&notification);
        assert_eq!(payload["aps"]["alert"]["title"], "Hello");
        assert_eq!(payload["aps"]["alert"]["body"], "World");
        assert_eq!(payload["aps"]["badge"], 3);
        assert_eq!(payload["conversation_id"], "42");
        assert!(payload["aps"].get("content-available").is_none());
    }

    #[test]
    fn test_background_notification() {
        let notification = Notification {
            content_available: true,
            ..Notification::default()
        };
        assert!(is_background(&notification));
        assert_eq!(build_apns_payload(&notification)["aps"]["content-available"], 1);
    }

    #[test]
    fn test_token_validation() {
        assert!(is_valid_token("a1b2c3"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("not-a-token"));
    }

    #[test]
    fn test_missing_private_key() {
        let config = ApnsConfig {
            bundle_id: "com.example".to_string(),
            team_id: "TEAM".to_string(),
            key_id: "KEY".to_string(),
            private_key: None,
            private_key_path: None,
            production: false,
        };
        let err = ApnsProvider::new(DeviceType::Ios, &config).err().unwrap();
        assert!(matches!(err, PushError::InvalidRequest(_)));
    }
}
