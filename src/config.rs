use crate::Millis;

/// Environment-driven settings for a server instance.
/// Every knob falls back to the crate-level default so a bare
/// `BIND_ADDR=127.0.0.1:8080 broadside` is a complete deployment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub queue_wait_ms: Millis,
    pub grace_ms: Millis,
    pub inactivity_ms: Millis,
    pub chat_ttl_ms: Millis,
    pub ready_ping_ms: Millis,
    pub kv_url: Option<String>,
    pub kv_prefix: String,
    pub kv_required: bool,
    pub db_url: Option<String>,
    pub db_required: bool,
    pub retention_match_days: u32,
    pub retention_security_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: String::from("0.0.0.0:8080"),
            queue_wait_ms: crate::QUEUE_WAIT_MS,
            grace_ms: crate::RECONNECT_GRACE_MS,
            inactivity_ms: crate::INACTIVITY_MS,
            chat_ttl_ms: crate::CHAT_TTL_MS,
            ready_ping_ms: crate::READY_PING_MS,
            kv_url: None,
            kv_prefix: String::from("broadside:"),
            kv_required: false,
            db_url: None,
            db_required: false,
            retention_match_days: 30,
            retention_security_days: 90,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            queue_wait_ms: parsed("QUEUE_WAIT_MS", defaults.queue_wait_ms),
            grace_ms: parsed("RECONNECT_GRACE_MS", defaults.grace_ms),
            inactivity_ms: parsed("INACTIVITY_MS", defaults.inactivity_ms),
            chat_ttl_ms: parsed("CHAT_TTL_MS", defaults.chat_ttl_ms),
            ready_ping_ms: parsed("READY_PING_MS", defaults.ready_ping_ms),
            kv_url: var("KV_URL"),
            kv_prefix: var("KV_PREFIX").unwrap_or(defaults.kv_prefix),
            kv_required: flag("KV_REQUIRED"),
            db_url: var("DB_URL"),
            db_required: flag("DB_REQUIRED"),
            retention_match_days: parsed("RETENTION_DAYS_MATCH", defaults.retention_match_days),
            retention_security_days: parsed(
                "RETENTION_DAYS_SECURITY",
                defaults.retention_security_days,
            ),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn flag(name: &str) -> bool {
    var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn parsed<T: std::str::FromStr + Copy>(name: &str, fallback: T) -> T {
    var(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_crate_tunables() {
        let settings = Settings::default();
        assert!(settings.queue_wait_ms == crate::QUEUE_WAIT_MS);
        assert!(settings.grace_ms == crate::RECONNECT_GRACE_MS);
        assert!(settings.inactivity_ms == crate::INACTIVITY_MS);
        assert!(settings.chat_ttl_ms == crate::CHAT_TTL_MS);
        assert!(settings.kv_url.is_none());
        assert!(settings.db_url.is_none());
    }
}
