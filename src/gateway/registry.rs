use crate::PlayerId;
use crate::RoomId;
use crate::protocol::Outbox;
use crate::room::Cmd;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// Where a connection currently lives. Checked on every room-scoped
/// frame; there are no object cycles, only ids resolved through
/// registries.
#[derive(Debug, Clone, Default)]
pub enum Binding {
    #[default]
    Unbound,
    Queued,
    Room {
        id: RoomId,
        tx: UnboundedSender<Cmd>,
    },
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub outbox: Outbox,
    pub binding: Binding,
}

/// Live connections by player id. Player ids are minted here, starting
/// above the bot's reserved zero.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<PlayerId, SessionHandle>>,
    counter: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(1),
        })
    }

    pub fn mint(&self) -> PlayerId {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn insert(&self, player: PlayerId, outbox: Outbox) {
        self.sessions.write().await.insert(
            player,
            SessionHandle {
                outbox,
                binding: Binding::Unbound,
            },
        );
    }

    pub async fn remove(&self, player: PlayerId) {
        self.sessions.write().await.remove(&player);
    }

    /// Moves a session onto a recovered identity (queue or room resume).
    pub async fn rebind(&self, from: PlayerId, to: PlayerId) {
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.remove(&from) {
            sessions.insert(to, handle);
        }
    }

    pub async fn set_binding(&self, player: PlayerId, binding: Binding) {
        if let Some(handle) = self.sessions.write().await.get_mut(&player) {
            handle.binding = binding;
        }
    }

    pub async fn binding(&self, player: PlayerId) -> Option<Binding> {
        self.sessions
            .read()
            .await
            .get(&player)
            .map(|h| h.binding.clone())
    }

    pub async fn outbox(&self, player: PlayerId) -> Option<Outbox> {
        self.sessions
            .read()
            .await
            .get(&player)
            .map(|h| h.outbox.clone())
    }

    pub async fn contains(&self, player: PlayerId) -> bool {
        self.sessions.read().await.contains_key(&player)
    }

    pub async fn live_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn minted_ids_start_above_the_bot() {
        let registry = SessionRegistry::new();
        let first = registry.mint();
        assert!(first > crate::room::BOT_ID);
        assert!(registry.mint() > first);
    }

    #[tokio::test]
    async fn rebind_moves_the_handle() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = unbounded_channel();
        registry.insert(10, tx).await;
        registry.set_binding(10, Binding::Queued).await;
        registry.rebind(10, 3).await;
        assert!(!registry.contains(10).await);
        assert!(matches!(registry.binding(3).await, Some(Binding::Queued)));
    }
}
