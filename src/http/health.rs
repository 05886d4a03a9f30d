use crate::services::guild_player::GuildRegistry;
use actix_web::web::Data;
use actix_web::{HttpResponse, Responder};
use serde_json::json;
use std::sync::Arc;

pub(crate) async fn readiness_check(registry: Data<Arc<GuildRegistry>>) -> impl Responder {
    let guilds = registry.guild_ids().await.len();

    HttpResponse::Ok().json(json!({ "status": "ok", "guilds": guilds }))
}
