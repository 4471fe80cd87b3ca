#![allow(dead_code)]

use dashmap::DashMap;
use privchat_push::model::{Application, Device, DeviceType, MockConfig, ProviderConfig};
use privchat_push::push::provider::{MockProvider, ProviderFactory, PushProvider};
use privchat_push::repository::{ApplicationRepository, DeviceRepository, MemoryStore};
use privchat_push::{PushManager, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 记录构造次数并保留 MockProvider 句柄的工厂
#[derive(Default)]
pub struct RecordingFactory {
    created: AtomicUsize,
    providers: DashMap<String, Arc<MockProvider>>,
}

impl RecordingFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// 按 label（"{app_id}/{device_type}"）取 Provider
    pub fn provider(&self, label: &str) -> Option<Arc<MockProvider>> {
        self.providers.get(label).map(|p| p.value().clone())
    }
}

impl ProviderFactory for RecordingFactory {
    fn create(&self, device_type: DeviceType, config: &ProviderConfig) -> Result<Arc<dyn PushProvider>> {
        let mock_config = match config {
            ProviderConfig::Mock(mock) => mock.clone(),
            _ => MockConfig::default(),
        };

        let provider = Arc::new(MockProvider::new(device_type, &mock_config));
        self.created.fetch_add(1, Ordering::SeqCst);
        self.providers
            .insert(provider.label().to_string(), Arc::clone(&provider));
        Ok(provider)
    }
}

pub fn label(app_id: &str, device_type: DeviceType) -> String {
    format!("{}/{}", app_id, device_type)
}

/// 为指定设备类型配置 Mock Provider 的应用
pub fn mock_app(id: &str, device_types: &[DeviceType]) -> Application {
    device_types.iter().fold(Application::new(id), |app, &device_type| {
        app.with_provider(
            device_type,
            ProviderConfig::Mock(MockConfig {
                label: Some(label(id, device_type)),
            }),
        )
    })
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub factory: Arc<RecordingFactory>,
    pub manager: PushManager,
}

impl Fixture {
    pub fn new(applications: Vec<Application>, devices: Vec<Device>) -> Self {
        let store = Arc::new(MemoryStore::new());
        for app in applications {
            store.insert_application(app);
        }
        for device in devices {
            store.insert_device(device);
        }

        let factory = Arc::new(RecordingFactory::default());
        let manager = PushManager::new(
            store.clone() as Arc<dyn ApplicationRepository>,
            store.clone() as Arc<dyn DeviceRepository>,
            factory.clone() as Arc<dyn ProviderFactory>,
            64,
        );

        Self {
            store,
            factory,
            manager,
        }
    }

    pub fn provider(&self, app_id: &str, device_type: DeviceType) -> Arc<MockProvider> {
        self.factory
            .provider(&label(app_id, device_type))
            .unwrap_or_else(|| panic!("provider {} not constructed", label(app_id, device_type)))
    }
}

/// 轮询等待异步条件成立（反馈清理在后台任务中执行）
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
