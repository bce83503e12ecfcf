use super::QueueEntry;
use super::QueueStore;
use crate::Millis;
use crate::PlayerId;
use redis::AsyncCommands;

// Persisted layout, all under the configured prefix:
//   queue:entries            hash  player id -> entry JSON
//   queue:joined             zset  player id scored by joined-at
//   queue:token:<token>      player id, TTL
//   queue:parked:<token>     entry JSON, TTL = grace window
const ENTRIES: &str = "queue:entries";
const JOINED: &str = "queue:joined";
const TOKEN: &str = "queue:token:";
const PARKED: &str = "queue:parked:";

/// Waiting-token TTL: generous, the matchmaker removes waiting entries
/// long before this lapses.
const TOKEN_TTL_MS: Millis = 10 * 60 * 1_000;

/// Pops the two oldest waiting entries and their token indexes in one
/// atomic step, the only way two matchmaker instances can share a queue.
const TAKE_MATCH: &str = r#"
local ids = redis.call('ZRANGE', KEYS[1], 0, 1)
if #ids < 2 then return {} end
local a = redis.call('HGET', KEYS[2], ids[1])
local b = redis.call('HGET', KEYS[2], ids[2])
redis.call('ZREM', KEYS[1], ids[1], ids[2])
redis.call('HDEL', KEYS[2], ids[1], ids[2])
for _, raw in ipairs({a, b}) do
  if raw then
    local token = cjson.decode(raw)['token']
    redis.call('DEL', ARGV[1] .. token)
  end
end
if a and b then return {a, b} end
return {}
"#;

/// Removes waiting entries older than the cutoff, bounded per call.
const TAKE_TIMED_OUT: &str = r#"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, tonumber(ARGV[2]))
local out = {}
for _, id in ipairs(ids) do
  local raw = redis.call('HGET', KEYS[2], id)
  redis.call('ZREM', KEYS[1], id)
  redis.call('HDEL', KEYS[2], id)
  if raw then
    table.insert(out, raw)
    local token = cjson.decode(raw)['token']
    redis.call('DEL', ARGV[3] .. token)
  end
end
return out
"#;

/// Queue store on the shared key-value store, for deployments running
/// more than one instance against one queue.
pub struct RedisQueue {
    client: redis::Client,
    prefix: String,
    take_match: redis::Script,
    take_timed_out: redis::Script,
}

impl RedisQueue {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            take_match: redis::Script::new(TAKE_MATCH),
            take_timed_out: redis::Script::new(TAKE_TIMED_OUT),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    async fn conn(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn entry_of(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        player: PlayerId,
    ) -> anyhow::Result<Option<QueueEntry>> {
        let raw: Option<String> = conn.hget(self.key(ENTRIES), player).await?;
        Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
    }
}

#[async_trait::async_trait]
impl QueueStore for RedisQueue {
    async fn upsert(&self, entry: QueueEntry) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let raw = serde_json::to_string(&entry)?;
        redis::pipe()
            .atomic()
            .hset(self.key(ENTRIES), entry.player, raw)
            .zadd(self.key(JOINED), entry.player, entry.joined_at)
            .set(format!("{}{}{}", self.prefix, TOKEN, entry.token), entry.player)
            .cmd("PEXPIRE")
            .arg(format!("{}{}{}", self.prefix, TOKEN, entry.token))
            .arg(TOKEN_TTL_MS)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_by_player(&self, player: PlayerId) -> anyhow::Result<Option<QueueEntry>> {
        let mut conn = self.conn().await?;
        let entry = self.entry_of(&mut conn, player).await?;
        if let Some(ref entry) = entry {
            redis::pipe()
                .atomic()
                .hdel(self.key(ENTRIES), player)
                .zrem(self.key(JOINED), player)
                .del(format!("{}{}{}", self.prefix, TOKEN, entry.token))
                .query_async::<()>(&mut conn)
                .await?;
        }
        Ok(entry)
    }

    async fn remove_by_token(&self, token: &str) -> anyhow::Result<Option<QueueEntry>> {
        let mut conn = self.conn().await?;
        let player: Option<PlayerId> = conn
            .get(format!("{}{}{}", self.prefix, TOKEN, token))
            .await?;
        match player {
            Some(player) => self.remove_by_player(player).await,
            None => {
                let raw: Option<String> = redis::cmd("GETDEL")
                    .arg(format!("{}{}{}", self.prefix, PARKED, token))
                    .query_async(&mut conn)
                    .await?;
                Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
            }
        }
    }

    async fn get_by_player(&self, player: PlayerId) -> anyhow::Result<Option<QueueEntry>> {
        let mut conn = self.conn().await?;
        self.entry_of(&mut conn, player).await
    }

    async fn get_by_token(&self, token: &str) -> anyhow::Result<Option<QueueEntry>> {
        let mut conn = self.conn().await?;
        let player: Option<PlayerId> = conn
            .get(format!("{}{}{}", self.prefix, TOKEN, token))
            .await?;
        match player {
            Some(player) => self.entry_of(&mut conn, player).await,
            None => Ok(None),
        }
    }

    async fn park(&self, player: PlayerId, ttl_ms: Millis) -> anyhow::Result<Option<QueueEntry>> {
        let mut conn = self.conn().await?;
        let entry = self.entry_of(&mut conn, player).await?;
        if let Some(ref entry) = entry {
            let raw = serde_json::to_string(entry)?;
            redis::pipe()
                .atomic()
                .hdel(self.key(ENTRIES), player)
                .zrem(self.key(JOINED), player)
                .del(format!("{}{}{}", self.prefix, TOKEN, entry.token))
                .set(format!("{}{}{}", self.prefix, PARKED, entry.token), raw)
                .cmd("PEXPIRE")
                .arg(format!("{}{}{}", self.prefix, PARKED, entry.token))
                .arg(ttl_ms)
                .query_async::<()>(&mut conn)
                .await?;
        }
        Ok(entry)
    }

    async fn take_parked(&self, token: &str) -> anyhow::Result<Option<QueueEntry>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(format!("{}{}{}", self.prefix, PARKED, token))
            .query_async(&mut conn)
            .await?;
        Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
    }

    async fn take_match(&self) -> anyhow::Result<Option<(QueueEntry, QueueEntry)>> {
        let mut conn = self.conn().await?;
        let raw: Vec<String> = self
            .take_match
            .key(self.key(JOINED))
            .key(self.key(ENTRIES))
            .arg(format!("{}{}", self.prefix, TOKEN))
            .invoke_async(&mut conn)
            .await?;
        match raw.len() {
            2 => Ok(Some((
                serde_json::from_str(&raw[0])?,
                serde_json::from_str(&raw[1])?,
            ))),
            _ => Ok(None),
        }
    }

    async fn take_timed_out(
        &self,
        cutoff: Millis,
        limit: usize,
    ) -> anyhow::Result<Vec<QueueEntry>> {
        let mut conn = self.conn().await?;
        let raw: Vec<String> = self
            .take_timed_out
            .key(self.key(JOINED))
            .key(self.key(ENTRIES))
            .arg(cutoff)
            .arg(limit)
            .arg(format!("{}{}", self.prefix, TOKEN))
            .invoke_async(&mut conn)
            .await?;
        raw.iter()
            .map(|r| Ok(serde_json::from_str(r)?))
            .collect()
    }
}
