use crate::services::guild_player::{CommandError, GuildRegistry, QueueStateError, ResolutionError};
use crate::types::GuildId;
use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path};
use actix_web::{HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Deserialize)]
pub(crate) struct EnqueueRequest {
    query: String,
}

fn status_code(error: &CommandError) -> StatusCode {
    match error {
        CommandError::Resolution(ResolutionError::NotFound(_)) => StatusCode::NOT_FOUND,
        CommandError::Resolution(ResolutionError::Resolver(_)) => StatusCode::BAD_GATEWAY,
        CommandError::QueueState(QueueStateError::NoSuchEntry(_)) => StatusCode::NOT_FOUND,
        CommandError::QueueState(_) | CommandError::Playback(_) => StatusCode::CONFLICT,
        CommandError::Transport(_) => StatusCode::BAD_GATEWAY,
        CommandError::GuildUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(guild_id: &GuildId, error: CommandError) -> HttpResponse {
    let status = status_code(&error);

    if status.is_server_error() {
        error!(%guild_id, ?error, "Guild command failed");
    } else {
        warn!(%guild_id, %error, "Guild command rejected");
    }

    HttpResponse::build(status).json(json!({ "error": error.to_string() }))
}

pub(crate) async fn connect(
    registry: Data<Arc<GuildRegistry>>,
    guild_id: Path<u64>,
) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    match registry.connect(&guild_id).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "connected": true })),
        Err(error) => error_response(&guild_id, error),
    }
}

pub(crate) async fn disconnect(
    registry: Data<Arc<GuildRegistry>>,
    guild_id: Path<u64>,
) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    match registry.disconnect(&guild_id).await {
        Ok(existed) => HttpResponse::Ok().json(json!({ "disconnected": existed })),
        Err(error) => error_response(&guild_id, error),
    }
}

pub(crate) async fn enqueue(
    registry: Data<Arc<GuildRegistry>>,
    guild_id: Path<u64>,
    request: Json<EnqueueRequest>,
) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    if request.query.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "Query must not be empty" }));
    }

    match registry.enqueue(&guild_id, &request.query).await {
        Ok(enqueued) => HttpResponse::Ok().json(enqueued),
        Err(error) => error_response(&guild_id, error),
    }
}

pub(crate) async fn get_queue(
    registry: Data<Arc<GuildRegistry>>,
    guild_id: Path<u64>,
) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());
    let queue = registry.queue_snapshot(&guild_id).await;
    let downloads = registry.download_status(&guild_id).await;

    HttpResponse::Ok().json(json!({ "queue": queue, "downloads": downloads }))
}

pub(crate) async fn remove_from_queue(
    registry: Data<Arc<GuildRegistry>>,
    path: Path<(u64, usize)>,
) -> impl Responder {
    let (guild_id, position) = path.into_inner();
    let guild_id = GuildId(guild_id);

    match registry.remove(&guild_id, position).await {
        Ok(removed) => HttpResponse::Ok().json(removed),
        Err(error) => error_response(&guild_id, error),
    }
}

pub(crate) async fn currently_playing(
    registry: Data<Arc<GuildRegistry>>,
    guild_id: Path<u64>,
) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    match registry.currently_playing(&guild_id).await {
        Some(now_playing) => HttpResponse::Ok().json(now_playing),
        None => HttpResponse::Ok().json(json!({
            "song": null,
            "progress": registry.progress(&guild_id).await,
        })),
    }
}

pub(crate) async fn skip(registry: Data<Arc<GuildRegistry>>, guild_id: Path<u64>) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    match registry.skip(&guild_id).await {
        Ok(skipped) => HttpResponse::Ok().json(json!({ "skipped": skipped })),
        Err(error) => error_response(&guild_id, error),
    }
}

pub(crate) async fn pause(registry: Data<Arc<GuildRegistry>>, guild_id: Path<u64>) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    match registry.pause(&guild_id).await {
        Ok(progress) => HttpResponse::Ok().json(progress),
        Err(error) => error_response(&guild_id, error),
    }
}

pub(crate) async fn resume(
    registry: Data<Arc<GuildRegistry>>,
    guild_id: Path<u64>,
) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    match registry.resume(&guild_id).await {
        Ok(progress) => HttpResponse::Ok().json(progress),
        Err(error) => error_response(&guild_id, error),
    }
}

pub(crate) async fn stop(registry: Data<Arc<GuildRegistry>>, guild_id: Path<u64>) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    match registry.stop(&guild_id).await {
        Ok(removed) => HttpResponse::Ok().json(json!({ "stopped": true, "removed": removed })),
        Err(error) => error_response(&guild_id, error),
    }
}

pub(crate) async fn clear(registry: Data<Arc<GuildRegistry>>, guild_id: Path<u64>) -> impl Responder {
    let guild_id = GuildId(guild_id.into_inner());

    match registry.clear(&guild_id).await {
        Ok(removed) => HttpResponse::Ok().json(json!({ "removed": removed })),
        Err(error) => error_response(&guild_id, error),
    }
}
