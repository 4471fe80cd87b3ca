pub mod feedback;
pub mod manager;
pub mod provider;
pub mod registry;
pub mod types;

pub use feedback::FeedbackReconciler;
pub use manager::PushManager;
pub use registry::ProviderRegistry;
pub use types::{DeviceFailure, DispatchReport, ProviderEvent, ProviderKey, PushReceipt};
