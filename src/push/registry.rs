use moka::future::Cache;
use std::sync::Arc;
use tracing::info;

use crate::error::{PushError, Result};
use crate::infra::metrics;
use crate::model::{Application, DeviceType};
use crate::push::feedback::FeedbackReconciler;
use crate::push::provider::{ProviderFactory, PushProvider};
use crate::push::types::ProviderKey;

/// Provider Registry（Provider 缓存）
///
/// 每个 (application_id, device_type) 最多一个 Provider 实例，首次解析时构造，
/// 之后与 Registry 同生命周期。缓存不设容量和 TTL，不会被淘汰。
/// 同一个键的并发构造由 `try_get_with` 合并为一次。
pub struct ProviderRegistry {
    cache: Cache<ProviderKey, Arc<dyn PushProvider>>,
    factory: Arc<dyn ProviderFactory>,
    reconciler: FeedbackReconciler,
}

impl ProviderRegistry {
    pub fn new(factory: Arc<dyn ProviderFactory>, reconciler: FeedbackReconciler) -> Self {
        Self {
            cache: Cache::builder().build(),
            factory,
            reconciler,
        }
    }

    /// 解析应用在该设备类型下的 Provider
    ///
    /// 已缓存时直接返回，不再检查推送配置。
    pub async fn resolve(&self, app: &Application, device_type: DeviceType) -> Result<Arc<dyn PushProvider>> {
        let key = ProviderKey::new(app.id.as_str(), device_type);
        if let Some(provider) = self.cache.get(&key).await {
            return Ok(provider);
        }

        self.cache
            .try_get_with(key.clone(), async { self.build(&key, app) })
            .await
            .map_err(|e: Arc<PushError>| (*e).clone())
    }

    fn build(&self, key: &ProviderKey, app: &Application) -> Result<Arc<dyn PushProvider>> {
        let settings = app
            .push_settings
            .as_ref()
            .ok_or_else(|| PushError::Configuration {
                app_id: app.id.clone(),
            })?;

        let config = settings
            .get(&key.device_type)
            .ok_or(PushError::UnsupportedDeviceType {
                device_type: key.device_type,
            })?;

        let provider = self.factory.create(key.device_type, config)?;
        self.reconciler.attach(key.clone(), &provider);

        metrics::record_provider_created(provider.name());
        info!(
            "[PUSH REGISTRY] Provider created: key={}, provider={}",
            key,
            provider.name()
        );
        Ok(provider)
    }

    /// 已缓存的 Provider 数量
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}
