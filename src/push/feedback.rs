use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::infra::event_bus::{ErrorChannel, ErrorEvent, ErrorSource};
use crate::infra::metrics;
use crate::model::DeviceFilter;
use crate::push::provider::PushProvider;
use crate::push::types::{ProviderEvent, ProviderKey};
use crate::repository::DeviceRepository;

/// Feedback Reconciler（反馈清理器）
///
/// 职责：
/// - 监听每个 Provider 的事件流
/// - 收到失效令牌时删除所有 device_token 相同的设备
/// - 把 Provider 错误和删除失败转发到错误通道
#[derive(Clone)]
pub struct FeedbackReconciler {
    devices: Arc<dyn DeviceRepository>,
    errors: ErrorChannel,
}

impl FeedbackReconciler {
    pub fn new(devices: Arc<dyn DeviceRepository>, errors: ErrorChannel) -> Self {
        Self { devices, errors }
    }

    /// 为 Provider 启动监听任务
    ///
    /// 订阅在返回前完成，构造之后立即发出的事件不会丢失。
    /// Provider 被释放后任务自动结束。
    pub fn attach(&self, key: ProviderKey, provider: &Arc<dyn PushProvider>) -> JoinHandle<()> {
        let mut receiver = provider.subscribe();
        let reconciler = self.clone();

        debug!("[PUSH FEEDBACK] Listening on provider {} ({})", key, provider.name());

        tokio::spawn(async move {
            // 事件逐个处理，清理慢时在通道中排队而不是被丢弃
            while let Some(event) = receiver.recv().await {
                match event {
                    ProviderEvent::InvalidTokens(tokens) => {
                        reconciler.prune(&key, &tokens).await;
                    }
                    ProviderEvent::Error(error) => {
                        reconciler.errors.publish(ErrorEvent::new(
                            key.app_id.clone(),
                            key.device_type,
                            ErrorSource::Provider,
                            error,
                        ));
                    }
                }
            }
            debug!("[PUSH FEEDBACK] Provider {} closed, listener stopped", key);
        })
    }

    /// 删除所有使用这些令牌的设备，返回删除总数
    ///
    /// 删除只按令牌匹配，不限定应用或设备类型；失败不重试。
    pub async fn prune(&self, key: &ProviderKey, tokens: &[String]) -> u64 {
        let mut pruned = 0;

        for token in tokens {
            if token.is_empty() {
                continue;
            }

            match self.devices.delete_where(&DeviceFilter::by_token(token.as_str())).await {
                Ok(count) => {
                    info!(
                        "[PUSH FEEDBACK] Pruned {} device(s) for invalid token {} (provider {})",
                        count, token, key
                    );
                    pruned += count;
                }
                Err(error) => {
                    self.errors.publish(ErrorEvent::new(
                        key.app_id.clone(),
                        key.device_type,
                        ErrorSource::Feedback,
                        error,
                    ));
                }
            }
        }

        metrics::record_feedback_pruned(pruned);
        pruned
    }
}
