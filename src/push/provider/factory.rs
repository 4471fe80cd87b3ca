use std::sync::Arc;
use tracing::warn;

use super::{ApnsProvider, FcmProvider, MockProvider, PushProvider};
use crate::error::{PushError, Result};
use crate::model::{DeviceType, ProviderConfig};

/// Provider 工厂：根据推送配置构造 Provider
///
/// 没有对应构造器时返回 `PushError::UnsupportedDeviceType`。
pub trait ProviderFactory: Send + Sync {
    fn create(&self, device_type: DeviceType, config: &ProviderConfig) -> Result<Arc<dyn PushProvider>>;
}

/// 默认工厂：APNs / FCM / Mock
pub struct DefaultProviderFactory {
    allow_mock: bool,
}

impl DefaultProviderFactory {
    pub fn new() -> Self {
        Self { allow_mock: true }
    }

    /// 生产环境可以禁用 Mock Provider
    pub fn allow_mock(mut self, allow: bool) -> Self {
        self.allow_mock = allow;
        self
    }
}

impl Default for DefaultProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, device_type: DeviceType, config: &ProviderConfig) -> Result<Arc<dyn PushProvider>> {
        match config {
            ProviderConfig::Apns(apns) => Ok(Arc::new(ApnsProvider::new(device_type, apns)?)),
            ProviderConfig::Fcm(fcm) => Ok(Arc::new(FcmProvider::new(device_type, fcm)?)),
            ProviderConfig::Mock(mock) if self.allow_mock => {
                Ok(Arc::new(MockProvider::new(device_type, mock)))
            }
            ProviderConfig::Mock(_) => {
                warn!(
                    "[PUSH FACTORY] Mock provider disabled, rejecting device_type={}",
                    device_type
                );
                Err(PushError::UnsupportedDeviceType { device_type })
            }
        }
    }
}
