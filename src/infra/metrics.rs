//! Prometheus 指标：推送接受/失败数、反馈清理数、错误事件数、Provider 构造数
//!
//! 通过 `init()` 安装全局 Recorder，`render_metrics()` 输出 Prometheus 文本格式。
//! 未初始化时 `metrics` 宏为空操作。

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

use super::event_bus::ErrorSource;
use crate::model::DeviceType;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 指标名称
const COUNTER_PUSH_ACCEPTED: &str = "privchat_push_accepted_total";
const COUNTER_PUSH_FAILED: &str = "privchat_push_failed_total";
const COUNTER_FEEDBACK_PRUNED: &str = "privchat_push_feedback_pruned_total";
const COUNTER_ERROR_EVENTS: &str = "privchat_push_error_events_total";
const COUNTER_PROVIDERS_CREATED: &str = "privchat_push_providers_created_total";

/// 初始化 Prometheus 指标（安装全局 Recorder）。
/// 仅需在进程内调用一次；重复调用会返回 Err。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    HANDLE
        .set(handle)
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

/// 渲染当前指标为 Prometheus 文本格式
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

pub fn record_push_accepted(device_type: DeviceType) {
    metrics::counter!(COUNTER_PUSH_ACCEPTED, "device_type" => device_type.as_str()).increment(1);
}

pub fn record_push_failed(device_type: DeviceType) {
    metrics::counter!(COUNTER_PUSH_FAILED, "device_type" => device_type.as_str()).increment(1);
}

pub fn record_feedback_pruned(count: u64) {
    metrics::counter!(COUNTER_FEEDBACK_PRUNED).increment(count);
}

pub fn record_error_event(source: ErrorSource) {
    let source = match source {
        ErrorSource::Provider => "provider",
        ErrorSource::Feedback => "feedback",
    };
    metrics::counter!(COUNTER_ERROR_EVENTS, "source" => source).increment(1);
}

pub fn record_provider_created(kind: &'static str) {
    metrics::counter!(COUNTER_PROVIDERS_CREATED, "provider" => kind).increment(1);
}
