use axum::{
    extract::{Path, State},
    routing::get,
    Json,
};
use jukebox_collab::TrackId;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    serialized::{ToSerialized, TrackInfo},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/tracks/{track_id}",
    tag = "tracks",
    responses(
        (status = 200, body = TrackInfo),
        (status = 502, description = "The catalog could not resolve the track")
    )
)]
async fn track_info(
    State(context): State<ServerContext>,
    Path(track_id): Path<i64>,
) -> ServerResult<Json<TrackInfo>> {
    let track_id = TrackId::new(track_id)
        .ok_or_else(|| ServerError::InvalidInput(format!("{} is not a valid track id", track_id)))?;

    let metadata = context.collab.resolve_track(track_id).await?;

    Ok(Json(metadata.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/:track_id", get(track_info))
}
