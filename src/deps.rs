use crate::STORE_PING_MS;
use std::sync::Arc;
use std::time::Duration;

/// The two external stores and whether each is allowed to be down.
/// Readiness probes inspect this registry and nothing else; a missing
/// optional dependency simply means the in-process fallback is active.
pub struct DepRegistry {
    kv: Option<(redis::Client, bool)>,
    db: Option<(Arc<tokio_postgres::Client>, bool)>,
}

impl DepRegistry {
    pub fn new(
        kv: Option<(redis::Client, bool)>,
        db: Option<(Arc<tokio_postgres::Client>, bool)>,
    ) -> Self {
        Self { kv, db }
    }

    pub async fn ready(&self) -> bool {
        if let Some((client, required)) = &self.kv {
            if *required && !ping_kv(client).await {
                return false;
            }
        }
        if let Some((client, required)) = &self.db {
            if *required && !ping_db(client).await {
                return false;
            }
        }
        true
    }

    pub async fn report(&self) -> serde_json::Value {
        let kv = match &self.kv {
            None => serde_json::json!({ "configured": false }),
            Some((client, required)) => serde_json::json!({
                "configured": true,
                "required": required,
                "reachable": ping_kv(client).await,
            }),
        };
        let db = match &self.db {
            None => serde_json::json!({ "configured": false }),
            Some((client, required)) => serde_json::json!({
                "configured": true,
                "required": required,
                "reachable": ping_db(client).await,
            }),
        };
        serde_json::json!({ "kv": kv, "db": db })
    }
}

async fn ping_kv(client: &redis::Client) -> bool {
    let ping = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        anyhow::Ok(())
    };
    match tokio::time::timeout(Duration::from_millis(STORE_PING_MS), ping).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::warn!("key-value store unreachable: {}", e);
            false
        }
        Err(_) => {
            log::warn!("key-value store ping timed out");
            false
        }
    }
}

async fn ping_db(client: &Arc<tokio_postgres::Client>) -> bool {
    let ping = client.simple_query("SELECT 1");
    match tokio::time::timeout(Duration::from_millis(STORE_PING_MS), ping).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            log::warn!("relational store unreachable: {}", e);
            false
        }
        Err(_) => {
            log::warn!("relational store ping timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_registry_is_ready() {
        let deps = DepRegistry::new(None, None);
        assert!(deps.ready().await);
        let report = deps.report().await;
        assert!(report["kv"]["configured"] == false);
        assert!(report["db"]["configured"] == false);
    }
}
