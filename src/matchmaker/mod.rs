use crate::MATCH_TICK_MS;
use crate::MATCH_TIMEOUT_BATCH;
use crate::config::Settings;
use crate::gateway::Binding;
use crate::gateway::SessionRegistry;
use crate::protocol::Matched;
use crate::protocol::ServerEvent;
use crate::queue::QueueEntry;
use crate::queue::QueueStore;
use crate::room::BOT_NICKNAME;
use crate::room::RoomRegistry;
use std::sync::Arc;

/// Periodic queue drainer: pairs the two oldest waiting players, and
/// after the queue-wait timeout hands loners to the bot. Each tick does
/// nothing beyond the two atomic store calls and room creation; failures
/// are logged and retried next tick.
pub struct Matchmaker {
    queue: Arc<dyn QueueStore>,
    rooms: Arc<RoomRegistry>,
    sessions: Arc<SessionRegistry>,
    settings: Arc<Settings>,
}

impl Matchmaker {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        rooms: Arc<RoomRegistry>,
        sessions: Arc<SessionRegistry>,
        settings: Arc<Settings>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            rooms,
            sessions,
            settings,
        })
    }

    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let matchmaker = self.clone();
        tokio::spawn(async move {
            let mut tick =
                tokio::time::interval(std::time::Duration::from_millis(MATCH_TICK_MS));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                matchmaker.drain().await;
            }
        })
    }

    /// One tick: drain ready pairs, then time out the patient.
    pub async fn drain(&self) {
        loop {
            match self.queue.take_match().await {
                Ok(Some((first, second))) => self.open_pvp(first, second).await,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("matchmaker: take_match failed: {}", e);
                    break;
                }
            }
        }
        let cutoff = crate::now().saturating_sub(self.settings.queue_wait_ms);
        match self.queue.take_timed_out(cutoff, MATCH_TIMEOUT_BATCH).await {
            Ok(entries) => {
                for entry in entries {
                    self.open_solo(entry).await;
                }
            }
            Err(e) => log::warn!("matchmaker: take_timed_out failed: {}", e),
        }
    }

    async fn open_pvp(&self, first: QueueEntry, second: QueueEntry) {
        let outbox_a = self.sessions.outbox(first.player).await;
        let outbox_b = self.sessions.outbox(second.player).await;
        let handle = self
            .rooms
            .open_pvp((&first, outbox_a.clone()), (&second, outbox_b.clone()))
            .await;
        let seats = [(&first, &second, outbox_a), (&second, &first, outbox_b)];
        for (me, opponent, outbox) in seats {
            self.sessions
                .set_binding(
                    me.player,
                    Binding::Room {
                        id: handle.id,
                        tx: handle.tx.clone(),
                    },
                )
                .await;
            if let Some(outbox) = outbox {
                let _ = outbox.send(ServerEvent::Matched(Matched {
                    room_id: handle.id,
                    opponent: opponent.nickname.clone(),
                    vs_bot: false,
                    reconnect_token: me.token.clone(),
                    you_ready: false,
                    opponent_ready: false,
                    message: String::from("opponent found, place your fleet"),
                }));
            }
        }
    }

    async fn open_solo(&self, entry: QueueEntry) {
        let outbox = self.sessions.outbox(entry.player).await;
        let handle = self.rooms.open_solo(&entry, outbox.clone()).await;
        self.sessions
            .set_binding(
                entry.player,
                Binding::Room {
                    id: handle.id,
                    tx: handle.tx.clone(),
                },
            )
            .await;
        if let Some(outbox) = outbox {
            let _ = outbox.send(ServerEvent::Matched(Matched {
                room_id: handle.id,
                opponent: String::from(BOT_NICKNAME),
                vs_bot: true,
                reconnect_token: entry.token.clone(),
                you_ready: false,
                opponent_ready: true,
                message: String::from("no opponent arrived, the bot steps in"),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use crate::telemetry::NoopSink;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    fn entry(player: crate::PlayerId, joined_at: crate::Millis) -> QueueEntry {
        QueueEntry {
            player,
            nickname: format!("p{}", player),
            joined_at,
            token: format!("token-{}", player),
        }
    }

    async fn harness() -> (Arc<Matchmaker>, Arc<dyn QueueStore>, Arc<SessionRegistry>, Arc<RoomRegistry>) {
        let settings = Arc::new(Settings::default());
        let queue: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
        let sessions = SessionRegistry::new();
        let rooms = RoomRegistry::new(settings.clone(), Arc::new(NoopSink), None);
        let matchmaker = Matchmaker::new(queue.clone(), rooms.clone(), sessions.clone(), settings);
        (matchmaker, queue, sessions, rooms)
    }

    #[tokio::test]
    async fn pairs_the_two_oldest_and_notifies_both() {
        let (matchmaker, queue, sessions, rooms) = harness().await;
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        sessions.insert(1, tx1).await;
        sessions.insert(2, tx2).await;
        queue.upsert(entry(1, 100)).await.expect("upsert");
        queue.upsert(entry(2, 200)).await.expect("upsert");
        matchmaker.drain().await;
        assert!(rooms.live_rooms().await == 1);
        assert!(queue.get_by_player(1).await.expect("ok").is_none());
        for rx in [&mut rx1, &mut rx2] {
            let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("matched promptly")
                .expect("outbox open");
            let ServerEvent::Matched(matched) = event else {
                panic!("expected queue:matched first");
            };
            assert!(!matched.vs_bot);
        }
        assert!(matches!(
            sessions.binding(1).await,
            Some(Binding::Room { .. })
        ));
    }

    #[tokio::test]
    async fn loner_times_out_into_a_bot_room() {
        let (matchmaker, queue, sessions, rooms) = harness().await;
        let (tx, mut rx) = unbounded_channel();
        sessions.insert(5, tx).await;
        let waited_out = crate::now() - crate::QUEUE_WAIT_MS - 1_000;
        queue.upsert(entry(5, waited_out)).await.expect("upsert");
        matchmaker.drain().await;
        assert!(rooms.live_rooms().await == 1);
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("matched promptly")
            .expect("outbox open");
        let ServerEvent::Matched(matched) = event else {
            panic!("expected queue:matched");
        };
        assert!(matched.vs_bot);
        assert!(matched.opponent_ready);
        assert!(matched.reconnect_token == "token-5");
    }

    #[tokio::test]
    async fn fresh_entries_keep_waiting() {
        let (matchmaker, queue, _, rooms) = harness().await;
        queue.upsert(entry(9, crate::now())).await.expect("upsert");
        matchmaker.drain().await;
        assert!(rooms.live_rooms().await == 0);
        assert!(queue.get_by_player(9).await.expect("ok").is_some());
    }
}
