use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::PushError;
use crate::model::DeviceType;

/// Provider 缓存键：(application_id, device_type)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderKey {
    pub app_id: String,
    pub device_type: DeviceType,
}

impl ProviderKey {
    pub fn new(app_id: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            app_id: app_id.into(),
            device_type,
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_id, self.device_type)
    }
}

/// Provider 异步发出的事件
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// 推送网络永久拒绝的令牌（反馈）
    InvalidTokens(Vec<String>),
    /// 推送被接受之后发生的错误
    Error(PushError),
}

/// 推送已被 Provider 接受（不代表已送达）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
    pub push_id: Uuid,
    pub device_id: String,
    pub device_type: DeviceType,
}

/// 单个设备在批量推送中的失败
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFailure {
    pub device_id: String,
    pub error: PushError,
}

/// 按条件批量推送的结果
///
/// 单个设备失败不会中断整个批次，失败明细记录在 `failures` 中。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchReport {
    /// 匹配到的设备数
    pub matched: usize,
    /// 已被 Provider 接受的推送，按设备发现顺序
    pub accepted: Vec<PushReceipt>,
    pub failures: Vec<DeviceFailure>,
}

impl DispatchReport {
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.accepted.len() == self.matched
    }
}
