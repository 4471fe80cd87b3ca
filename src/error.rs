use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::DeviceType;

/// 推送调度错误类型
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PushError {
    /// 设备未找到
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },
    /// 应用未找到
    #[error("Application not found: {app_id}")]
    ApplicationNotFound { app_id: String },
    /// 应用存在但没有可用的推送配置
    #[error("Application {app_id} has no push settings")]
    Configuration { app_id: String },
    /// 推送配置中没有该设备类型
    #[error("Unsupported device type: {device_type}")]
    UnsupportedDeviceType { device_type: DeviceType },
    /// Provider 在推送过程中或之后报告的错误
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },
    /// 存储层错误
    #[error("Store error: {0}")]
    Store(String),
    /// 无效的请求
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误分类（对外暴露的错误种类）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Configuration,
    UnsupportedDeviceType,
    Provider,
    Store,
    InvalidRequest,
    Internal,
}

/// 错误代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// 设备未找到
    DeviceNotFound = 1004,
    /// 应用未找到
    ApplicationNotFound = 1005,
    /// 配置错误
    Configuration = 2003,
    /// 不支持的设备类型
    UnsupportedDeviceType = 4000,
    /// 无效的请求
    InvalidRequest = 4001,
    /// Provider 错误
    Provider = 5000,
    /// 存储错误
    Store = 2000,
    /// 内部错误
    Internal = 1000,
}

/// NotFound 错误携带的结构化信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundDetails {
    pub device_id: Option<String>,
    pub app_id: Option<String>,
}

impl PushError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PushError::DeviceNotFound { .. } | PushError::ApplicationNotFound { .. } => {
                ErrorKind::NotFound
            }
            PushError::Configuration { .. } => ErrorKind::Configuration,
            PushError::UnsupportedDeviceType { .. } => ErrorKind::UnsupportedDeviceType,
            PushError::Provider { .. } => ErrorKind::Provider,
            PushError::Store(_) => ErrorKind::Store,
            PushError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PushError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }

    /// 返回 NotFound 错误的详细信息，其他错误返回 None
    pub fn not_found_details(&self) -> Option<NotFoundDetails> {
        match self {
            PushError::DeviceNotFound { device_id } => Some(NotFoundDetails {
                device_id: Some(device_id.clone()),
                app_id: None,
            }),
            PushError::ApplicationNotFound { app_id } => Some(NotFoundDetails {
                device_id: None,
                app_id: Some(app_id.clone()),
            }),
            _ => None,
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        PushError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<&PushError> for ErrorCode {
    fn from(error: &PushError) -> Self {
        match error {
            PushError::DeviceNotFound { .. } => ErrorCode::DeviceNotFound,
            PushError::ApplicationNotFound { .. } => ErrorCode::ApplicationNotFound,
            PushError::Configuration { .. } => ErrorCode::Configuration,
            PushError::UnsupportedDeviceType { .. } => ErrorCode::UnsupportedDeviceType,
            PushError::Provider { .. } => ErrorCode::Provider,
            PushError::Store(_) => ErrorCode::Store,
            PushError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            PushError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<sqlx::Error> for PushError {
    fn from(err: sqlx::Error) -> Self {
        PushError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for PushError {
    fn from(err: serde_json::Error) -> Self {
        PushError::InvalidRequest(err.to_string())
    }
}

impl From<std::io::Error> for PushError {
    fn from(err: std::io::Error) -> Self {
        PushError::Internal(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, PushError>;
