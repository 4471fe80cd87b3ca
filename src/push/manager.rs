use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PushConfig;
use crate::error::{PushError, Result};
use crate::infra::event_bus::{ErrorChannel, ErrorEvent};
use crate::infra::metrics;
use crate::model::{Application, Device, DeviceFilter, DeviceType, Notification};
use crate::push::feedback::FeedbackReconciler;
use crate::push::provider::{DefaultProviderFactory, ProviderFactory, PushProvider};
use crate::push::registry::ProviderRegistry;
use crate::push::types::{DeviceFailure, DispatchReport, PushReceipt};
use crate::repository::{ApplicationRepository, DeviceRepository};

/// 批量推送时默认同时进行的 Provider 解析数
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 8;

/// Push Manager（推送调度入口）
///
/// 职责：
/// - 设备 → 应用 → Provider 的解析链
/// - 单设备推送和按条件批量推送
/// - 暴露异步错误通道（推送被接受之后的失败）
///
/// Provider 缓存归属于 Manager 实例，随 Manager 释放。
pub struct PushManager {
    applications: Arc<dyn ApplicationRepository>,
    devices: Arc<dyn DeviceRepository>,
    registry: ProviderRegistry,
    errors: ErrorChannel,
    resolve_concurrency: usize,
}

impl PushManager {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        devices: Arc<dyn DeviceRepository>,
        factory: Arc<dyn ProviderFactory>,
        error_channel_capacity: usize,
    ) -> Self {
        let errors = ErrorChannel::new(error_channel_capacity);
        let reconciler = FeedbackReconciler::new(Arc::clone(&devices), errors.clone());

        Self {
            applications,
            devices,
            registry: ProviderRegistry::new(factory, reconciler),
            errors,
            resolve_concurrency: DEFAULT_RESOLVE_CONCURRENCY,
        }
    }

    /// 限制批量推送中同时进行的 Provider 解析数（至少为 1）
    pub fn with_resolve_concurrency(mut self, limit: usize) -> Self {
        self.resolve_concurrency = limit.max(1);
        self
    }

    /// 按配置创建，使用默认 Provider 工厂
    pub fn from_config(
        config: &PushConfig,
        applications: Arc<dyn ApplicationRepository>,
        devices: Arc<dyn DeviceRepository>,
    ) -> Self {
        let factory = DefaultProviderFactory::new().allow_mock(config.providers.allow_mock);

        Self::new(
            applications,
            devices,
            Arc::new(factory),
            config.events.error_channel_capacity,
        )
        .with_resolve_concurrency(config.providers.resolve_concurrency)
    }

    /// 为应用的某个设备类型配置 Provider
    ///
    /// 幂等：同一个键重复调用返回同一个实例。
    pub async fn configure_application(
        &self,
        app_id: &str,
        device_type: DeviceType,
    ) -> Result<Arc<dyn PushProvider>> {
        let app = self.load_application(app_id).await?;
        self.registry.resolve(&app, device_type).await
    }

    /// 向单个设备推送
    ///
    /// 返回时推送只是被 Provider 接受；之后的投递失败通过 `subscribe_errors` 观察。
    pub async fn notify_by_id(&self, device_id: &str, notification: &Notification) -> Result<PushReceipt> {
        let device = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| PushError::DeviceNotFound {
                device_id: device_id.to_string(),
            })?;

        let provider = self.resolve_device(&device).await?;
        self.dispatch(&device, provider.as_ref(), notification).await
    }

    /// 按条件向多个设备推送
    ///
    /// Provider 解析最多 `resolve_concurrency` 个同时进行，推送按设备发现顺序依次发出。
    /// 单个设备失败不会中断批次，失败记录在 `DispatchReport::failures` 中；
    /// 只有设备查询本身失败时返回错误。
    pub async fn notify_by_query(
        &self,
        filter: &DeviceFilter,
        notification: &Notification,
    ) -> Result<DispatchReport> {
        let devices = self.devices.find(filter).await?;
        debug!("[PUSH MANAGER] Query matched {} device(s): {:?}", devices.len(), filter);

        let resolved: Vec<_> = stream::iter(devices.iter().map(|device| self.resolve_device(device)))
            .buffered(self.resolve_concurrency)
            .collect()
            .await;

        let mut report = DispatchReport {
            matched: devices.len(),
            ..DispatchReport::default()
        };

        for (device, provider) in devices.iter().zip(resolved) {
            let result = match provider {
                Ok(provider) => self.dispatch(device, provider.as_ref(), notification).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(receipt) => report.accepted.push(receipt),
                Err(error) => {
                    warn!(
                        "[PUSH MANAGER] Device {} skipped in batch: {}",
                        device.id, error
                    );
                    report.failures.push(DeviceFailure {
                        device_id: device.id.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "[PUSH MANAGER] Batch dispatched: matched={}, accepted={}, failed={}",
            report.matched,
            report.accepted.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// 订阅异步错误
    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.errors.subscribe()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    async fn load_application(&self, app_id: &str) -> Result<Application> {
        self.applications
            .find_by_id(app_id)
            .await?
            .ok_or_else(|| PushError::ApplicationNotFound {
                app_id: app_id.to_string(),
            })
    }

    async fn resolve_device(&self, device: &Device) -> Result<Arc<dyn PushProvider>> {
        let app = self.load_application(&device.app_id).await?;
        self.registry.resolve(&app, device.device_type).await
    }

    async fn dispatch(
        &self,
        device: &Device,
        provider: &dyn PushProvider,
        notification: &Notification,
    ) -> Result<PushReceipt> {
        let push_id = Uuid::new_v4();

        match provider.push(notification, &device.device_token).await {
            Ok(()) => {
                metrics::record_push_accepted(device.device_type);
                debug!(
                    "[PUSH MANAGER] Push accepted: push_id={}, device_id={}, provider={}",
                    push_id,
                    device.id,
                    provider.name()
                );
                Ok(PushReceipt {
                    push_id,
                    device_id: device.id.clone(),
                    device_type: device.device_type,
                })
            }
            Err(e) => {
                metrics::record_push_failed(device.device_type);
                warn!(
                    "[PUSH MANAGER] Push rejected: push_id={}, device_id={}, provider={}, error={}",
                    push_id,
                    device.id,
                    provider.name(),
                    e
                );
                Err(e)
            }
        }
    }
}
