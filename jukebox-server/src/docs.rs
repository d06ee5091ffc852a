use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::{events, rooms, schemas, serialized, settings, tracks};

#[derive(OpenApi)]
#[openapi(
    paths(
        rooms::list_rooms,
        rooms::create_room,
        rooms::room,
        rooms::delete_room,
        rooms::playlist,
        rooms::tracks,
        rooms::add_track,
        rooms::remove_track,
        rooms::reposition,
        rooms::perform_room_action,
        rooms::notify,
        rooms::run_command,
        tracks::track_info,
        settings::save_settings,
        events::event_socket,
        events::broadcast,
    ),
    components(schemas(
        serialized::Room,
        serialized::Track,
        serialized::AddedTrack,
        serialized::TrackInfo,
        serialized::CommandReply,
        schemas::NewTrackSchema,
        schemas::PositionSchema,
        schemas::NotificationSchema,
        schemas::CommandSchema,
        schemas::CatalogSettingsSchema,
        schemas::RoomActionSchema,
    )),
    info(description = "jukebox-server exposes endpoints to share a playlist within a room")
)]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
