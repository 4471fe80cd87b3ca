pub mod apns;
pub mod factory;
pub mod fcm;
pub mod mock;
pub mod provider_trait;

pub use apns::ApnsProvider;
pub use factory::{DefaultProviderFactory, ProviderFactory};
pub use fcm::FcmProvider;
pub use mock::MockProvider;
pub use provider_trait::PushProvider;

use crate::push::types::ProviderEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Provider 事件发送端
///
/// 每个订阅者一条无界通道，事件不会因为订阅者处理慢而被覆盖。
/// 没有订阅者时事件直接丢弃；已关闭的订阅在下次发送时移除。
#[derive(Clone, Default)]
pub struct EventEmitter {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ProviderEvent>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProviderEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());

        if subscribers.is_empty() {
            debug!("[PUSH PROVIDER] Event dropped, no subscribers: {:?}", event);
            return;
        }

        for tx in subscribers.iter() {
            if let Err(e) = tx.send(event.clone()) {
                debug!("[PUSH PROVIDER] Subscriber gone, event dropped: {:?}", e.0);
            }
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }
}
