pub mod cli;
pub mod config;
pub mod error;
pub mod infra;
pub mod logging;
pub mod model;
pub mod push;
pub mod repository;

pub use config::PushConfig;
pub use error::{ErrorKind, PushError, Result};
pub use infra::event_bus::{ErrorChannel, ErrorEvent, ErrorSource};
pub use model::{Application, Device, DeviceFilter, DeviceType, Notification, ProviderConfig};
pub use push::{DispatchReport, ProviderRegistry, PushManager, PushReceipt};
