use crate::error::Result;
use crate::model::{DeviceType, Notification};
use crate::push::types::ProviderEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Push Provider Trait（推送提供者接口）
///
/// `push` 在推送被接受后立即返回；投递结果通过 `subscribe` 返回的事件流异步上报：
/// 失效令牌为 `ProviderEvent::InvalidTokens`，其他投递失败为 `ProviderEvent::Error`。
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// 发送推送
    async fn push(&self, notification: &Notification, token: &str) -> Result<()>;

    /// 订阅 Provider 事件（不丢失，按发出顺序）
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent>;

    /// Provider 服务的设备类型
    fn device_type(&self) -> DeviceType;

    /// Provider 名称（用于日志和错误信息）
    fn name(&self) -> &'static str;
}
