use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::{ApplicationRepository, DeviceRepository};
use crate::error::{PushError, Result};
use crate::model::{Application, Device, DeviceFilter};

/// 种子数据（JSON 文件格式）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl SeedData {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PushError::Store(format!(
                "Failed to read seed file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// 内存存储
///
/// 设备按插入顺序保存，`find` 返回的顺序即插入顺序。
#[derive(Default)]
pub struct MemoryStore {
    applications: DashMap<String, Application>,
    devices: RwLock<Vec<Device>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let store = Self::new();
        store.load_seed(seed);
        store
    }

    pub fn load_seed(&self, seed: SeedData) {
        let (apps, devices) = (seed.applications.len(), seed.devices.len());
        for app in seed.applications {
            self.insert_application(app);
        }
        for device in seed.devices {
            self.insert_device(device);
        }
        info!(
            "[PUSH STORE] Seed loaded: applications={}, devices={}",
            apps, devices
        );
    }

    pub fn insert_application(&self, app: Application) {
        self.applications.insert(app.id.clone(), app);
    }

    /// 插入设备；相同 id 的设备原位替换，保持原有顺序
    pub fn insert_device(&self, device: Device) {
        let mut devices = self.devices.write();
        match devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device,
            None => devices.push(device),
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Application>> {
        Ok(self.applications.get(id).map(|app| app.value().clone()))
    }
}

#[async_trait]
impl DeviceRepository for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Device>> {
        Ok(self.devices.read().iter().find(|d| d.id == id).cloned())
    }

    async fn find(&self, filter: &DeviceFilter) -> Result<Vec<Device>> {
        Ok(self
            .devices
            .read()
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn delete_where(&self, filter: &DeviceFilter) -> Result<u64> {
        if filter.is_empty() {
            return Err(PushError::InvalidRequest(
                "refusing to delete devices with an empty filter".to_string(),
            ));
        }

        let mut devices = self.devices.write();
        let before = devices.len();
        devices.retain(|d| !filter.matches(d));
        let removed = (before - devices.len()) as u64;
        debug!("[PUSH STORE] Deleted {} device(s) for {:?}", removed, filter);
        Ok(removed)
    }
}
