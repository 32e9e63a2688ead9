use std::sync::Arc;

use anyhow::Result;
use chrono::{FixedOffset, Offset, Utc};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use zrelay_notify::dispatcher::{MessengerFactory, NotificationDispatcher};
use zrelay_notify::telegram::TelegramMessenger;
use zrelay_notify::Messenger;
use zrelay_storage::Store;

use zrelay_server::config::ServerConfig;
use zrelay_server::directory::StoreSubscriberDirectory;
use zrelay_server::poller::PollOrchestrator;
use zrelay_server::scheduler::PollScheduler;

fn display_timezone(offset_hours: i32) -> FixedOffset {
    match FixedOffset::east_opt(offset_hours.clamp(-23, 23) * 3600) {
        Some(tz) => tz,
        None => Utc.fix(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    zrelay_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("zrelay=info".parse()?))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::from_env(),
    };
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(Store::connect(&config.db_url, &config.app_secret).await?);

    let default_messenger: Option<Arc<dyn Messenger>> = config
        .telegram
        .bot_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|token| {
            Arc::new(TelegramMessenger::with_api_base(token, &config.telegram.api_base))
                as Arc<dyn Messenger>
        });
    if default_messenger.is_none() {
        tracing::warn!("No Telegram bot token configured; only groups with their own token can be notified");
    }
    let api_base = config.telegram.api_base.clone();
    let messenger_factory: MessengerFactory = Box::new(move |token: &str| {
        Arc::new(TelegramMessenger::with_api_base(token, &api_base)) as Arc<dyn Messenger>
    });

    let dispatcher = Arc::new(NotificationDispatcher::new(
        default_messenger,
        messenger_factory,
        Arc::new(StoreSubscriberDirectory::new(store.clone())),
        display_timezone(config.telegram.timezone_offset_hours),
    ));

    let defaults = config.config_defaults();
    let orchestrator = Arc::new(PollOrchestrator::new(
        store.clone(),
        dispatcher,
        defaults.clone(),
        config.poll.fetch_limit,
    ));
    let scheduler = PollScheduler::new(store, orchestrator, defaults, config.poll.refresh_secs);

    tracing::info!("zrelay started");
    tokio::select! {
        _ = scheduler.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }
    Ok(())
}
