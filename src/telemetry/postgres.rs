use super::EventSink;
use super::Telemetry;
use std::sync::Arc;
use tokio_postgres::Client;

const MATCH_EVENTS: &str = "match_events";
const SECURITY_EVENTS: &str = "security_events";

/// Relational sink. The schema is bootstrapped externally; this side only
/// ever INSERTs.
pub struct PgSink {
    client: Arc<Client>,
}

impl PgSink {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    async fn insert(&self, event: &Telemetry) -> Result<(), tokio_postgres::Error> {
        match event {
            Telemetry::MatchStarted {
                room,
                vs_bot,
                players,
            } => {
                #[rustfmt::skip]
                const SQL: &str = const_format::concatcp!(
                    "INSERT INTO ", MATCH_EVENTS, " (at, room_id, kind, vs_bot, player_a, player_b) ",
                    "VALUES                         ($1, $2,      $3,   $4,     $5,       $6)"
                );
                self.client
                    .execute(
                        SQL,
                        &[
                            &(crate::now() as i64),
                            &(*room as i64),
                            &"match_started",
                            vs_bot,
                            &(players[0] as i64),
                            &(players[1] as i64),
                        ],
                    )
                    .await?;
            }
            Telemetry::MatchEnded {
                room,
                winner,
                reason,
                total_shots,
                duration_ms,
            } => {
                #[rustfmt::skip]
                const SQL: &str = const_format::concatcp!(
                    "INSERT INTO ", MATCH_EVENTS, " (at, room_id, kind, winner, reason, total_shots, duration_ms) ",
                    "VALUES                         ($1, $2,      $3,   $4,     $5,     $6,          $7)"
                );
                self.client
                    .execute(
                        SQL,
                        &[
                            &(crate::now() as i64),
                            &(*room as i64),
                            &"match_ended",
                            &winner.map(|w| w as i64),
                            &reason.to_string(),
                            &(*total_shots as i32),
                            &(*duration_ms as i64),
                        ],
                    )
                    .await?;
            }
            Telemetry::Security {
                player,
                kind,
                detail,
            } => {
                #[rustfmt::skip]
                const SQL: &str = const_format::concatcp!(
                    "INSERT INTO ", SECURITY_EVENTS, " (at, player_id, kind, detail) ",
                    "VALUES                            ($1, $2,        $3,   $4)"
                );
                self.client
                    .execute(
                        SQL,
                        &[
                            &(crate::now() as i64),
                            &(*player as i64),
                            &kind.as_str().to_string(),
                            detail,
                        ],
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventSink for PgSink {
    async fn record(&self, event: Telemetry) {
        if let Err(e) = self.insert(&event).await {
            log::warn!("telemetry write failed: {}", e);
        }
    }
}
