use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::PushError;
use crate::model::DeviceType;

/// 异步错误来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSource {
    /// Provider 在接受推送之后报告的错误
    Provider,
    /// 反馈清理（删除失效设备）失败
    Feedback,
}

/// 错误通道事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub app_id: String,
    pub device_type: DeviceType,
    pub source: ErrorSource,
    pub error: PushError,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(app_id: impl Into<String>, device_type: DeviceType, source: ErrorSource, error: PushError) -> Self {
        Self {
            app_id: app_id.into(),
            device_type,
            source,
            error,
            occurred_at: Utc::now(),
        }
    }
}

/// 错误通道（进程内广播）
///
/// 推送被接受之后才发生的失败只能通过这里观察到，不会回到原始调用的返回值。
#[derive(Clone)]
pub struct ErrorChannel {
    sender: broadcast::Sender<ErrorEvent>,
}

impl ErrorChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 发布错误事件；没有订阅者时只记录日志
    pub fn publish(&self, event: ErrorEvent) {
        warn!(
            "[PUSH ERRORS] {:?} error: app_id={}, device_type={}, error={}",
            event.source, event.app_id, event.device_type, event.error
        );
        crate::infra::metrics::record_error_event(event.source);

        if self.sender.send(event).is_err() {
            debug!("[PUSH ERRORS] No subscribers on error channel");
        }
    }

    /// 订阅错误事件
    pub fn subscribe(&self) -> broadcast::Receiver<ErrorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new(1024)
    }
}
