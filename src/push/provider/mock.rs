use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::info;

use super::EventEmitter;
use crate::error::{PushError, Result};
use crate::model::{DeviceType, MockConfig, Notification};
use crate::push::provider::provider_trait::PushProvider;
use crate::push::types::ProviderEvent;

/// Mock Provider（用于测试和本地演示）
///
/// 不调用真实 API，只打印日志并记录每次推送；可以手动触发反馈和错误事件。
pub struct MockProvider {
    device_type: DeviceType,
    label: String,
    events: EventEmitter,
    pushed: Mutex<Vec<(Notification, String)>>,
    reject: AtomicBool,
}

impl MockProvider {
    pub fn new(device_type: DeviceType, config: &MockConfig) -> Self {
        Self {
            device_type,
            label: config.label.clone().unwrap_or_else(|| "mock".to_string()),
            events: EventEmitter::new(),
            pushed: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// 已接受的推送 (notification, token)，按调用顺序
    pub fn pushed(&self) -> Vec<(Notification, String)> {
        self.pushed.lock().clone()
    }

    pub fn push_count(&self) -> usize {
        self.pushed.lock().len()
    }

    /// 之后的推送全部拒绝（不接受请求）
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn emit_invalid_tokens(&self, tokens: Vec<String>) {
        self.events.emit(ProviderEvent::InvalidTokens(tokens));
    }

    pub fn emit_error(&self, message: impl Into<String>) {
        self.events
            .emit(ProviderEvent::Error(PushError::provider(self.name(), message)));
    }
}

#[async_trait]
impl PushProvider for MockProvider {
    async fn push(&self, notification: &Notification, token: &str) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(PushError::provider(self.name(), "push rejected"));
        }

        info!(
            "[MOCK PUSH] Sending push: label={}, device_type={}, token={}, title={:?}",
            self.label,
            self.device_type,
            token,
            notification.title()
        );
        self.pushed
            .lock()
            .push((notification.clone(), token.to_string()));
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
