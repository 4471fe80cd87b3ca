// Infrastructure layer - 基础设施层
// 负责错误通道和监控指标

pub mod event_bus;
pub mod metrics;

pub use event_bus::{ErrorChannel, ErrorEvent, ErrorSource};
