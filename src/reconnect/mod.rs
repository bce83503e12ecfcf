use crate::PlayerId;
use crate::Token;
use crate::gateway::SessionRegistry;
use crate::queue::QueueEntry;
use crate::queue::QueueStore;
use crate::room::RoomHandle;
use crate::room::RoomRegistry;
use std::sync::Arc;

const NICKNAME_MAX: usize = 24;

/// Opaque, unguessable 128-bit reconnect token.
pub fn mint_token() -> Token {
    format!("{:032x}", rand::random::<u128>())
}

fn sanitize_nickname(raw: Option<String>, player: PlayerId) -> String {
    raw.map(|n| n.trim().chars().filter(|c| !c.is_control()).take(NICKNAME_MAX).collect())
        .filter(|n: &String| !n.is_empty())
        .unwrap_or_else(|| format!("sailor-{}", player))
}

/// Where a `search:join` landed after walking the resolution order:
/// live room, parked entry, waiting entry, fresh join.
#[derive(Debug)]
pub enum Resolution {
    Resumed {
        player: PlayerId,
        handle: RoomHandle,
        token: Token,
    },
    Recovered {
        entry: QueueEntry,
    },
    Waiting {
        entry: QueueEntry,
    },
    Fresh {
        entry: QueueEntry,
        expired_token: bool,
    },
    InUse,
}

/// Maps reconnect tokens back onto rooms or queue entries. Tokens are
/// single-use-per-session: a token whose identity already has a live
/// session resolves to `InUse`.
pub struct Coordinator {
    queue: Arc<dyn QueueStore>,
    rooms: Arc<RoomRegistry>,
    sessions: Arc<SessionRegistry>,
}

impl Coordinator {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        rooms: Arc<RoomRegistry>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            queue,
            rooms,
            sessions,
        }
    }

    pub async fn resolve(
        &self,
        connection: PlayerId,
        nickname: Option<String>,
        token: Option<Token>,
    ) -> anyhow::Result<Resolution> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(Resolution::Fresh {
                entry: self.fresh(connection, nickname).await?,
                expired_token: false,
            });
        };
        if let Some((room, player, handle)) = self.rooms.by_token(&token).await {
            if self.sessions.contains(player).await && player != connection {
                return Ok(Resolution::InUse);
            }
            log::info!("token resumes player {} into room {}", player, room);
            return Ok(Resolution::Resumed {
                player,
                handle,
                token,
            });
        }
        if let Some(entry) = self.queue.take_parked(&token).await? {
            if self.sessions.contains(entry.player).await && entry.player != connection {
                self.queue.upsert(entry).await?;
                return Ok(Resolution::InUse);
            }
            self.queue.upsert(entry.clone()).await?;
            log::info!("token recovers player {} into the queue", entry.player);
            return Ok(Resolution::Recovered { entry });
        }
        if let Some(entry) = self.queue.get_by_token(&token).await? {
            if self.sessions.contains(entry.player).await && entry.player != connection {
                return Ok(Resolution::InUse);
            }
            self.queue.upsert(entry.clone()).await?;
            return Ok(Resolution::Waiting { entry });
        }
        Ok(Resolution::Fresh {
            entry: self.fresh(connection, nickname).await?,
            expired_token: true,
        })
    }

    async fn fresh(
        &self,
        player: PlayerId,
        nickname: Option<String>,
    ) -> anyhow::Result<QueueEntry> {
        let entry = QueueEntry {
            player,
            nickname: sanitize_nickname(nickname, player),
            joined_at: crate::now(),
            token: mint_token(),
        };
        self.queue.upsert(entry.clone()).await?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::queue::MemoryQueue;
    use crate::telemetry::NoopSink;
    use tokio::sync::mpsc::unbounded_channel;

    fn coordinator() -> (Coordinator, Arc<dyn QueueStore>, Arc<SessionRegistry>, Arc<RoomRegistry>) {
        let settings = Arc::new(Settings::default());
        let queue: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
        let sessions = SessionRegistry::new();
        let rooms = RoomRegistry::new(settings.clone(), Arc::new(NoopSink), None);
        let coordinator = Coordinator::new(queue.clone(), rooms.clone(), sessions.clone());
        (coordinator, queue, sessions, rooms)
    }

    #[tokio::test]
    async fn tokens_are_long_and_unique() {
        let a = mint_token();
        let b = mint_token();
        assert!(a.len() == 32);
        assert!(a != b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn no_token_enqueues_fresh() {
        let (coordinator, queue, _, _) = coordinator();
        let resolution = coordinator
            .resolve(7, Some(String::from("ada")), None)
            .await
            .expect("resolves");
        let Resolution::Fresh {
            entry,
            expired_token,
        } = resolution
        else {
            panic!("expected a fresh join");
        };
        assert!(!expired_token);
        assert!(entry.nickname == "ada");
        assert!(queue.get_by_player(7).await.expect("ok").is_some());
    }

    #[tokio::test]
    async fn stale_token_reports_expiry() {
        let (coordinator, _, _, _) = coordinator();
        let resolution = coordinator
            .resolve(7, None, Some(String::from("long-gone")))
            .await
            .expect("resolves");
        assert!(matches!(
            resolution,
            Resolution::Fresh {
                expired_token: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn waiting_token_rebinds() {
        let (coordinator, queue, _, _) = coordinator();
        let entry = QueueEntry {
            player: 3,
            nickname: String::from("p3"),
            joined_at: crate::now() - 5_000,
            token: String::from("tok-3"),
        };
        queue.upsert(entry.clone()).await.expect("upsert");
        let resolution = coordinator
            .resolve(40, None, Some(String::from("tok-3")))
            .await
            .expect("resolves");
        let Resolution::Waiting { entry: found } = resolution else {
            panic!("expected the waiting entry");
        };
        assert!(found.player == 3);
        assert!(found.joined_at == entry.joined_at);
    }

    #[tokio::test]
    async fn parked_token_recovers_into_waiting() {
        let (coordinator, queue, _, _) = coordinator();
        let entry = QueueEntry {
            player: 3,
            nickname: String::from("p3"),
            joined_at: crate::now(),
            token: String::from("tok-3"),
        };
        queue.upsert(entry).await.expect("upsert");
        queue.park(3, 30_000).await.expect("park");
        let resolution = coordinator
            .resolve(41, None, Some(String::from("tok-3")))
            .await
            .expect("resolves");
        assert!(matches!(resolution, Resolution::Recovered { .. }));
        assert!(queue.get_by_player(3).await.expect("ok").is_some());
    }

    #[tokio::test]
    async fn room_token_resumes() {
        let (coordinator, _, _, rooms) = coordinator();
        let a = QueueEntry {
            player: 1,
            nickname: String::from("p1"),
            joined_at: crate::now(),
            token: String::from("tok-1"),
        };
        let b = QueueEntry {
            player: 2,
            nickname: String::from("p2"),
            joined_at: crate::now(),
            token: String::from("tok-2"),
        };
        let handle = rooms.open_pvp((&a, None), (&b, None)).await;
        let resolution = coordinator
            .resolve(50, None, Some(String::from("tok-1")))
            .await
            .expect("resolves");
        let Resolution::Resumed { player, handle: found, .. } = resolution else {
            panic!("expected a room resume");
        };
        assert!(player == 1);
        assert!(found.id == handle.id);
    }

    #[tokio::test]
    async fn live_session_blocks_a_second_use() {
        let (coordinator, queue, sessions, _) = coordinator();
        let entry = QueueEntry {
            player: 3,
            nickname: String::from("p3"),
            joined_at: crate::now(),
            token: String::from("tok-3"),
        };
        queue.upsert(entry).await.expect("upsert");
        let (tx, _rx) = unbounded_channel();
        sessions.insert(3, tx).await;
        let resolution = coordinator
            .resolve(60, None, Some(String::from("tok-3")))
            .await
            .expect("resolves");
        assert!(matches!(resolution, Resolution::InUse));
    }
}
