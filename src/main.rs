use crate::config::Config;
use crate::services::guild_player::{
    Backoff, CachingResolver, DownloadCache, GuildRegistry, PlayerSettings, RetryPolicy,
};
use crate::services::{ProcessTransport, YtDlpFetcher};
use crate::storage::OnDiskContentStore;
use actix_rt::signal::unix;
use actix_web::web::Data;
use actix_web::{web, App, HttpServer};
use futures_lite::FutureExt;
use search_providers::YouTubeClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod config;
mod http;
mod services;
mod storage;
mod types;
mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

fn player_settings(config: &Config) -> PlayerSettings {
    let retry_delay = Duration::from_millis(config.retry_delay_ms);
    let backoff = match config.retry_backoff.to_lowercase().as_str() {
        "linear" => Backoff::Linear(retry_delay),
        "fixed" => Backoff::Fixed(retry_delay),
        other => {
            warn!(backoff = other, "Unknown retry backoff, using fixed");
            Backoff::Fixed(retry_delay)
        }
    };

    PlayerSettings {
        max_concurrent_downloads: config.max_concurrent_downloads,
        retry_policy: RetryPolicy {
            max_attempts: config.max_retries,
            backoff,
            attempt_timeout: Duration::from_secs(config.download_timeout_secs),
        },
        monitor_interval: Duration::from_millis(config.monitor_interval_ms),
        conductor_interval: Duration::from_millis(config.conductor_interval_ms),
        progress_interval: Duration::from_millis(config.progress_interval_ms),
    }
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    let mut terminate = unix::signal(unix::SignalKind::terminate())?;
    let mut interrupt = unix::signal(unix::SignalKind::interrupt())?;

    dotenv::dotenv().ok();
    env_logger::init();

    let config = Arc::from(Config::from_env());

    info!(version = VERSION, "Starting application...");

    let download_cache = match config.cache_file() {
        Some(path) => DownloadCache::load(path)
            .await
            .expect("Unable to load download cache"),
        None => DownloadCache::in_memory(),
    };
    let youtube_client =
        YouTubeClient::create(&config.youtube_api_key).expect("Unable to initialize YouTube client");

    let registry = {
        Arc::new(GuildRegistry::new(
            Arc::new(CachingResolver::new(
                Arc::new(youtube_client),
                Arc::new(download_cache),
            )),
            Arc::new(ProcessTransport::new(&config.player_command)),
            Arc::new(YtDlpFetcher::new(&config.ytdlp_path)),
            Arc::new(OnDiskContentStore::create(&config.download_directory)),
            player_settings(&config),
        ))
    };

    actix_rt::spawn({
        let registry = Arc::clone(&registry);
        let idle_timeout = Duration::from_secs(config.idle_timeout_secs);

        async move {
            let mut interval = tokio::time::interval(IDLE_CHECK_INTERVAL);

            loop {
                interval.tick().await;

                let removed = registry.remove_idle(idle_timeout).await;

                if !removed.is_empty() {
                    info!(?removed, "Idle guilds disconnected");
                }
            }
        }
    });

    let shutdown_timeout = config.shutdown_timeout;
    let bind_address = config.bind_address.clone();

    let server = HttpServer::new({
        let registry = Arc::clone(&registry);

        move || {
            App::new()
                .app_data(Data::new(Arc::clone(&registry)))
                .service(web::resource("/healthz").route(web::get().to(http::readiness_check)))
                .service(
                    web::scope("/api/guilds/{guild_id}")
                        .route("/connect", web::post().to(http::connect))
                        .route("/disconnect", web::post().to(http::disconnect))
                        .route("/queue", web::get().to(http::get_queue))
                        .route("/queue", web::post().to(http::enqueue))
                        .route("/queue/{position}", web::delete().to(http::remove_from_queue))
                        .route("/currently-playing", web::get().to(http::currently_playing))
                        .route("/skip", web::post().to(http::skip))
                        .route("/pause", web::post().to(http::pause))
                        .route("/resume", web::post().to(http::resume))
                        .route("/stop", web::post().to(http::stop))
                        .route("/clear", web::post().to(http::clear)),
                )
        }
    })
    .shutdown_timeout(shutdown_timeout)
    .bind(bind_address)?
    .run();

    let server_handle = server.handle();

    actix_rt::spawn({
        async move {
            if let Err(error) = server.await {
                error!(?error, "Error on http server");
            }
        }
    });

    info!("Application started");

    interrupt.recv().or(terminate.recv()).await;

    info!("Received shutdown signal. Shutting down gracefully...");

    registry.shutdown().await;
    server_handle.stop(true).await;

    Ok(())
}
