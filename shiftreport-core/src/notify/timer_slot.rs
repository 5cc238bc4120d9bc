//! Per-user single-slot timers with cancel/replace semantics

use crate::models::ChatId;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Slot {
    generation: u64,
    handle: JoinHandle<()>,
}

/// At most one live timer per chat.
///
/// Arming a slot aborts the timer it replaces. When a timer elapses it clears its own
/// slot before running, so a later `cancel` or `arm` never aborts a callback mid-flight.
#[derive(Default)]
pub struct TimerSlots {
    slots: DashMap<ChatId, Slot>,
    next_generation: AtomicU64,
}

impl TimerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fire` after `delay`, replacing any timer already armed for `chat`
    pub fn arm<F>(self: &Arc<Self>, chat: ChatId, delay: Duration, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let slots = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            slots
                .slots
                .remove_if(&chat, |_, slot| slot.generation == generation);
            fire.await;
        });
        if let Some(previous) = self.slots.insert(chat, Slot { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Abort the armed timer, if any. Returns true when one was cancelled.
    pub fn cancel(&self, chat: ChatId) -> bool {
        match self.slots.remove(&chat) {
            Some((_, slot)) => {
                slot.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, chat: ChatId) -> bool {
        self.slots.contains_key(&chat)
    }

    pub fn armed_count(&self) -> usize {
        self.slots.len()
    }
}
