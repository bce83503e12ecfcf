use super::ActionKind;
use super::Limiter;
use super::Verdict;
use super::verdict;
use crate::Millis;
use crate::PlayerId;
use std::collections::HashMap;
use tokio::sync::Mutex;

const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Millis,
    count: u32,
}

/// Process-local fixed-window counters with an opportunistic sweep once
/// the map grows past a threshold.
#[derive(Debug, Default)]
pub struct WindowLimiter {
    windows: Mutex<HashMap<(PlayerId, ActionKind), Window>>,
}

impl WindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep(windows: &mut HashMap<(PlayerId, ActionKind), Window>, now: Millis) {
        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|(_, kind), w| now.saturating_sub(w.started) < kind.bound().1);
        }
    }
}

#[async_trait::async_trait]
impl Limiter for WindowLimiter {
    async fn check(&self, player: PlayerId, kind: ActionKind) -> Verdict {
        let now = crate::now();
        let (_, window_ms) = kind.bound();
        let mut windows = self.windows.lock().await;
        Self::sweep(&mut windows, now);
        let window = windows.entry((player, kind)).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_sub(window.started) >= window_ms {
            window.started = now;
            window.count = 0;
        }
        window.count += 1;
        verdict(kind, window.count)
    }

    async fn forget(&self, player: PlayerId) {
        self.windows
            .lock()
            .await
            .retain(|(p, _), _| *p != player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn budget_is_exact() {
        let limiter = WindowLimiter::new();
        let (max, _) = ActionKind::Shot.bound();
        for _ in 0..max {
            assert!(limiter.check(1, ActionKind::Shot).await == Verdict::Allowed);
        }
        assert!(limiter.check(1, ActionKind::Shot).await == Verdict::Limited);
    }

    #[tokio::test]
    async fn budgets_are_per_player_and_kind() {
        let limiter = WindowLimiter::new();
        let (max, _) = ActionKind::SearchJoin.bound();
        for _ in 0..=max {
            limiter.check(1, ActionKind::SearchJoin).await;
        }
        assert!(limiter.check(2, ActionKind::SearchJoin).await == Verdict::Allowed);
        assert!(limiter.check(1, ActionKind::Cancel).await == Verdict::Allowed);
    }

    #[tokio::test]
    async fn invalid_request_flood_escalates_to_ban() {
        let limiter = WindowLimiter::new();
        let (max, _) = ActionKind::InvalidRequests.bound();
        for _ in 0..max {
            assert!(limiter.check(9, ActionKind::InvalidRequests).await == Verdict::Allowed);
        }
        assert!(limiter.check(9, ActionKind::InvalidRequests).await == Verdict::Banned);
    }

    #[tokio::test]
    async fn forget_clears_the_slate() {
        let limiter = WindowLimiter::new();
        let (max, _) = ActionKind::Shot.bound();
        for _ in 0..=max {
            limiter.check(5, ActionKind::Shot).await;
        }
        limiter.forget(5).await;
        assert!(limiter.check(5, ActionKind::Shot).await == Verdict::Allowed);
    }
}
