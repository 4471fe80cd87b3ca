use crate::error::Result;
use crate::model::{Application, Device, DeviceFilter};
use async_trait::async_trait;

/// 应用 Repository（只读，应用由外部系统维护）
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// 根据主键查找应用
    async fn find_by_id(&self, id: &str) -> Result<Option<Application>>;
}

/// 设备 Repository
///
/// 推送调度层只查询设备，唯一的写操作是反馈清理时删除失效令牌对应的设备。
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// 根据主键查找设备
    async fn find_by_id(&self, id: &str) -> Result<Option<Device>>;

    /// 按条件查询设备，返回存储层的自然顺序
    async fn find(&self, filter: &DeviceFilter) -> Result<Vec<Device>>;

    /// 按条件删除设备，返回删除数量
    async fn delete_where(&self, filter: &DeviceFilter) -> Result<u64>;
}

pub mod memory;
pub mod pg;

pub use memory::{MemoryStore, SeedData};
pub use pg::PgStore;
