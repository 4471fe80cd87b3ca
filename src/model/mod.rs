//! 数据模型模块

pub mod application;
pub mod device;
pub mod notification;

pub use application::{
    Application, ApnsConfig, FcmConfig, MockConfig, ProviderConfig, PushSettings,
};
pub use device::{Device, DeviceFilter, DeviceType};
pub use notification::{Alert, Notification, NotificationPriority};
