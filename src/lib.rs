pub mod board;
pub mod bot;
pub mod chat;
pub mod config;
pub mod deps;
pub mod gateway;
pub mod limiter;
pub mod matchmaker;
pub mod protocol;
pub mod queue;
pub mod reconnect;
pub mod room;
pub mod telemetry;

/// session layer identity types
pub type PlayerId = u64;
pub type RoomId = u64;
pub type ShipId = u8;
pub type Token = String;
pub type Millis = u64;

// board geometry
pub const BOARD_SIZE: i8 = 10;
pub const FLEET_SHIPS: usize = 10;
pub const FLEET_CELLS: usize = 20;

// session layer timing
pub const QUEUE_WAIT_MS: Millis = 60_000;
pub const RECONNECT_GRACE_MS: Millis = 30_000;
pub const INACTIVITY_MS: Millis = 120_000;
pub const CHAT_TTL_MS: Millis = 60_000;
pub const MATCH_TICK_MS: Millis = 250;
pub const BOT_THINK_MIN_MS: Millis = 250;
pub const BOT_THINK_MAX_MS: Millis = 500;
pub const STORE_PING_MS: Millis = 800;
pub const READY_PING_MS: Millis = 10_000;

// chat policy
pub const CHAT_HISTORY_CAP: usize = 80;
pub const CHAT_TEXT_MAX: usize = 240;

// bounded-attempt parameters
pub const HUNT_SAMPLE_ATTEMPTS: usize = 64;
pub const PLACE_ATTEMPTS_PER_SHIP: usize = 128;
pub const MATCH_TIMEOUT_BATCH: usize = 16;

/// trait for random generation, mainly (strictly?) for testing
pub trait Arbitrary {
    fn random() -> Self;
}

/// milliseconds since the unix epoch, the time base for all deadlines
pub fn now() -> Millis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_millis() as Millis
}

/// initialize logging and exit on ctrl-c
pub fn init() {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        println!();
        log::warn!("forcing exit");
        std::process::exit(0);
    });
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", now())).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

/// get a relational store connection and return the client
pub async fn db(url: &str) -> anyhow::Result<std::sync::Arc<tokio_postgres::Client>> {
    log::info!("connecting to relational store");
    let tls = tokio_postgres::tls::NoTls;
    let (client, connection) = tokio_postgres::connect(url, tls).await?;
    tokio::spawn(connection);
    Ok(std::sync::Arc::new(client))
}

/// open a key-value store client (connections are established lazily)
pub fn kv(url: &str) -> anyhow::Result<redis::Client> {
    log::info!("opening key-value store client");
    Ok(redis::Client::open(url)?)
}
