use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json,
};
use jukebox_collab::{Command, PlaylistError, TrackId};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        CommandSchema, NewTrackSchema, NotificationSchema, PositionSchema, RoomActionSchema,
        ValidatedJson,
    },
    serialized::{AddedTrack, CommandReply, Room, ToSerialized, Track},
    Router,
};

fn track_id(value: i64) -> ServerResult<TrackId> {
    TrackId::new(value)
        .ok_or_else(|| ServerError::InvalidInput(format!("{} is not a valid track id", value)))
}

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
async fn list_rooms(State(context): State<ServerContext>) -> ServerResult<Json<Vec<Room>>> {
    let rooms = context.collab.rooms.list_rooms().await?;

    Ok(Json(rooms.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    responses(
        (status = 201, body = Room)
    )
)]
async fn create_room(
    State(context): State<ServerContext>,
) -> ServerResult<(StatusCode, Json<Room>)> {
    let room = context.collab.rooms.create_room().await?;

    Ok((StatusCode::CREATED, Json(room.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}",
    tag = "rooms",
    responses(
        (status = 200, body = Room),
        (status = 404, description = "No room has this code")
    )
)]
async fn room(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.resolve_code(&code).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}",
    tag = "rooms",
    responses(
        (status = 204, description = "Room and its playlist were deleted")
    )
)]
async fn delete_room(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<StatusCode> {
    context.collab.rooms.delete_room(&code).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/playlist",
    tag = "playlist",
    responses(
        (status = 200, body = Vec<Track>, description = "Tracks the catalog could resolve, in order")
    )
)]
async fn playlist(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Vec<Track>>> {
    let room = context.collab.rooms.resolve_code(&code).await?;
    let tracks = context.collab.playlists.list_playlist(&room).await?;

    Ok(Json(tracks.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/tracks",
    tag = "playlist",
    responses(
        (status = 200, body = Vec<Track>, description = "Every track in order, without catalog details")
    )
)]
async fn tracks(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Vec<Track>>> {
    let room = context.collab.rooms.resolve_code(&code).await?;
    let tracks = context.collab.playlists.list_entries(&room).await?;

    Ok(Json(tracks.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/tracks",
    tag = "playlist",
    request_body = NewTrackSchema,
    responses(
        (status = 201, body = AddedTrack),
        (status = 400, description = "The reference is not a track id or link"),
        (status = 404, description = "The room doesn't exist"),
        (status = 409, description = "The track is already in the playlist")
    )
)]
async fn add_track(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<NewTrackSchema>,
) -> ServerResult<(StatusCode, Json<AddedTrack>)> {
    // A malformed reference is reported before the room is looked up
    TrackId::parse(&body.reference).map_err(PlaylistError::from)?;

    let room = context.collab.rooms.resolve_code(&code).await?;
    let added = context
        .collab
        .playlists
        .add_track(&room, &body.reference)
        .await?;

    Ok((StatusCode::CREATED, Json(added.to_serialized())))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}/tracks/{track_id}",
    tag = "playlist",
    responses(
        (status = 204, description = "Track was removed"),
        (status = 404, description = "The room or the track doesn't exist")
    )
)]
async fn remove_track(
    State(context): State<ServerContext>,
    Path((code, track)): Path<(String, i64)>,
) -> ServerResult<StatusCode> {
    let room = context.collab.rooms.resolve_code(&code).await?;
    context
        .collab
        .playlists
        .remove_track(&room, track_id(track)?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{code}/tracks/{track_id}/position",
    tag = "playlist",
    request_body = PositionSchema,
    responses(
        (status = 200, body = Track),
        (status = 404, description = "The room or the track doesn't exist")
    )
)]
async fn reposition(
    State(context): State<ServerContext>,
    Path((code, track)): Path<(String, i64)>,
    ValidatedJson(body): ValidatedJson<PositionSchema>,
) -> ServerResult<Json<Track>> {
    let room = context.collab.rooms.resolve_code(&code).await?;
    let track = context
        .collab
        .playlists
        .reposition(&room, track_id(track)?, body.position)
        .await?;

    Ok(Json(track.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/actions",
    tag = "rooms",
    request_body = RoomActionSchema,
    responses(
        (status = 204, description = "Action was relayed to the room's player")
    )
)]
async fn perform_room_action(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    Json(body): Json<RoomActionSchema>,
) -> ServerResult<StatusCode> {
    let room = context.collab.rooms.resolve_code(&code).await?;
    context.collab.playlists.transport(&room, body.into());

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/notifications",
    tag = "rooms",
    request_body = NotificationSchema,
    responses(
        (status = 204, description = "Notification was sent to the room")
    )
)]
async fn notify(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<NotificationSchema>,
) -> ServerResult<StatusCode> {
    let room = context.collab.rooms.resolve_code(&code).await?;
    context.collab.playlists.notify(&room, body.message);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/commands",
    tag = "rooms",
    request_body = CommandSchema,
    responses(
        (status = 200, body = CommandReply)
    )
)]
async fn run_command(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<CommandSchema>,
) -> ServerResult<Json<CommandReply>> {
    let room = context.collab.rooms.resolve_code(&code).await?;
    let reply = context
        .collab
        .execute(&room, Command::parse(&body.text))
        .await?;

    Ok(Json(CommandReply { reply }))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/", post(create_room))
        .route("/:code", get(room))
        .route("/:code", delete(delete_room))
        .route("/:code/playlist", get(playlist))
        .route("/:code/tracks", get(tracks))
        .route("/:code/tracks", post(add_track))
        .route("/:code/tracks/:track_id", delete(remove_track))
        .route("/:code/tracks/:track_id/position", put(reposition))
        .route("/:code/actions", post(perform_room_action))
        .route("/:code/notifications", post(notify))
        .route("/:code/commands", post(run_command))
}
