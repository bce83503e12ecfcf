use super::Room;
use super::RoomSnapshot;
use super::actor::Cmd;
use super::actor::RoomActor;
use crate::PlayerId;
use crate::RoomId;
use crate::Token;
use crate::config::Settings;
use crate::protocol::Outbox;
use crate::queue::QueueEntry;
use crate::telemetry::EventSink;
use crate::telemetry::Telemetry;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

/// Mailbox address of a live room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub id: RoomId,
    pub tx: UnboundedSender<Cmd>,
}

/// Writes room snapshots to the key-value store as idempotent upserts,
/// off the game path.
#[derive(Clone)]
pub struct SnapshotStore {
    client: redis::Client,
    prefix: String,
}

impl SnapshotStore {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    pub fn save(&self, snapshot: RoomSnapshot) {
        let client = self.client.clone();
        let key = format!("{}room:{}", self.prefix, snapshot.id);
        tokio::spawn(async move {
            let write = async {
                let raw = serde_json::to_string(&snapshot)?;
                let mut conn = client.get_multiplexed_async_connection().await?;
                redis::cmd("SET")
                    .arg(&key)
                    .arg(raw)
                    .query_async::<()>(&mut conn)
                    .await?;
                anyhow::Ok(())
            };
            if let Err(e) = write.await {
                log::warn!("room snapshot write failed: {}", e);
            }
        });
    }

    pub fn delete(&self, id: RoomId) {
        let client = self.client.clone();
        let key = format!("{}room:{}", self.prefix, id);
        tokio::spawn(async move {
            let drop = async {
                let mut conn = client.get_multiplexed_async_connection().await?;
                redis::cmd("DEL")
                    .arg(&key)
                    .query_async::<()>(&mut conn)
                    .await?;
                anyhow::Ok(())
            };
            if let Err(e) = drop.await {
                log::warn!("room snapshot delete failed: {}", e);
            }
        });
    }
}

/// Process-wide map of live rooms and of reconnect tokens into them.
/// Creation spawns the owning actor; everything else is lookups.
pub struct RoomRegistry {
    pub(crate) settings: Arc<Settings>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) snapshots: Option<SnapshotStore>,
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    tokens: RwLock<HashMap<Token, (RoomId, PlayerId)>>,
    counter: AtomicU64,
}

impl RoomRegistry {
    pub fn new(
        settings: Arc<Settings>,
        sink: Arc<dyn EventSink>,
        snapshots: Option<SnapshotStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            sink,
            snapshots,
            rooms: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(1),
        })
    }

    pub async fn open_pvp(
        self: &Arc<Self>,
        first: (&QueueEntry, Option<Outbox>),
        second: (&QueueEntry, Option<Outbox>),
    ) -> RoomHandle {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut room = Room::pvp(id, first, second);
        for slot in room.slots.iter_mut().filter(|s| !s.connected()) {
            slot.grace_until = Some(crate::now() + self.settings.grace_ms);
        }
        self.open(room).await
    }

    pub async fn open_solo(self: &Arc<Self>, entry: &QueueEntry, outbox: Option<Outbox>) -> RoomHandle {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut room = Room::solo(id, entry, outbox);
        for slot in room.slots.iter_mut().filter(|s| !s.connected() && !s.is_bot()) {
            slot.grace_until = Some(crate::now() + self.settings.grace_ms);
        }
        self.open(room).await
    }

    async fn open(self: &Arc<Self>, room: Room) -> RoomHandle {
        let id = room.id;
        let players = [room.slots[0].player, room.slots[1].player];
        let vs_bot = room.vs_bot;
        let mut tokens = self.tokens.write().await;
        for slot in room.slots.iter() {
            if let Some(ref token) = slot.token {
                tokens.insert(token.clone(), (id, slot.player));
            }
        }
        drop(tokens);
        let (tx, mailbox) = unbounded_channel();
        let handle = RoomHandle { id, tx };
        self.rooms.write().await.insert(id, handle.clone());
        RoomActor::launch(room, mailbox, self.clone());
        crate::telemetry::record(
            &self.sink,
            Telemetry::MatchStarted {
                room: id,
                vs_bot,
                players,
            },
        );
        log::info!("opened room {} (vs_bot: {})", id, vs_bot);
        handle
    }

    pub async fn handle(&self, id: RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(&id).cloned()
    }

    /// Token lookup for the reconnect path: a hit means the token still
    /// belongs to a live, not-yet-over room.
    pub async fn by_token(&self, token: &str) -> Option<(RoomId, PlayerId, RoomHandle)> {
        let target = self.tokens.read().await.get(token).copied();
        match target {
            Some((room, player)) => self
                .handle(room)
                .await
                .map(|handle| (room, player, handle)),
            None => None,
        }
    }

    /// Drops token bindings the moment a room goes terminal; resumption
    /// past this point falls through to the queue path.
    pub async fn invalidate(&self, tokens: &[Token]) {
        let mut map = self.tokens.write().await;
        for token in tokens {
            map.remove(token);
        }
    }

    pub async fn remove(&self, id: RoomId, tokens: &[Token]) {
        self.invalidate(tokens).await;
        self.rooms.write().await.remove(&id);
        if let Some(ref snapshots) = self.snapshots {
            snapshots.delete(id);
        }
    }

    pub async fn live_rooms(&self) -> usize {
        self.rooms.read().await.len()
    }
}
