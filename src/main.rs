use broadside::config::Settings;
use broadside::deps::DepRegistry;
use broadside::gateway;
use broadside::gateway::App;
use broadside::gateway::SessionRegistry;
use broadside::limiter::Limiter;
use broadside::limiter::SharedLimiter;
use broadside::limiter::WindowLimiter;
use broadside::matchmaker::Matchmaker;
use broadside::queue::MemoryQueue;
use broadside::queue::QueueStore;
use broadside::queue::RedisQueue;
use broadside::reconnect::Coordinator;
use broadside::room::RoomRegistry;
use broadside::room::SnapshotStore;
use broadside::telemetry::EventSink;
use broadside::telemetry::NoopSink;
use broadside::telemetry::PgSink;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    broadside::init();
    log::info!("broadside server startup");
    let settings = Arc::new(Settings::from_env());

    let kv = match settings.kv_url.as_deref() {
        None => None,
        Some(url) => match broadside::kv(url) {
            Ok(client) => Some(client),
            Err(e) if settings.kv_required => panic!("key-value store required: {e}"),
            Err(e) => {
                log::warn!("key-value store unavailable, using in-process stores: {}", e);
                None
            }
        },
    };
    let db = match settings.db_url.as_deref() {
        None => None,
        Some(url) => match broadside::db(url).await {
            Ok(client) => Some(client),
            Err(e) if settings.db_required => panic!("relational store required: {e}"),
            Err(e) => {
                log::warn!("relational store unavailable, telemetry disabled: {}", e);
                None
            }
        },
    };

    let sink: Arc<dyn EventSink> = match db.clone() {
        Some(client) => Arc::new(PgSink::new(client)),
        None => Arc::new(NoopSink),
    };
    let queue: Arc<dyn QueueStore> = match kv.clone() {
        Some(client) => Arc::new(RedisQueue::new(client, settings.kv_prefix.clone())),
        None => Arc::new(MemoryQueue::new()),
    };
    let limiter: Arc<dyn Limiter> = match kv.clone() {
        Some(client) => Arc::new(SharedLimiter::new(client, settings.kv_prefix.clone())),
        None => Arc::new(WindowLimiter::new()),
    };
    let snapshots = kv
        .clone()
        .map(|client| SnapshotStore::new(client, settings.kv_prefix.clone()));
    let deps = Arc::new(DepRegistry::new(
        kv.map(|client| (client, settings.kv_required)),
        db.map(|client| (client, settings.db_required)),
    ));

    let sessions = SessionRegistry::new();
    let rooms = RoomRegistry::new(settings.clone(), sink.clone(), snapshots);
    let reconnect = Arc::new(Coordinator::new(queue.clone(), rooms.clone(), sessions.clone()));
    Matchmaker::new(queue.clone(), rooms.clone(), sessions.clone(), settings.clone()).spawn();

    gateway::Server::run(App {
        settings,
        sessions,
        rooms,
        queue,
        limiter,
        reconnect,
        sink,
        deps,
    })
    .await
    .expect("gateway bind");
}
