use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::Response,
    routing::get,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use jukebox_core::{Connection, Subscription};
use log::{debug, warn};
use serde_json::Value;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::EventsQuery,
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    params(EventsQuery),
    responses(
        (
            status = 101,
            description = "A websocket of JSON events, each with a \"type\" field"
        ),
        (status = 404, description = "The room doesn't exist")
    )
)]
async fn event_socket(
    State(context): State<ServerContext>,
    Query(query): Query<EventsQuery>,
    ws: WebSocketUpgrade,
) -> ServerResult<Response> {
    let subscription = match query.room {
        Some(code) => Subscription::Room(context.collab.rooms.resolve_code(&code).await?.id),
        None => Subscription::Global,
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, context, subscription)))
}

/// Pumps hub messages into the socket until either side goes away
async fn handle_socket(socket: WebSocket, context: ServerContext, subscription: Subscription) {
    let hub = context.collab.hub().clone();
    let (connection, mut outbox) =
        Connection::channel(subscription, hub.config().outbox_capacity);
    let id = connection.id;

    if let Err(e) = hub.attach(connection) {
        warn!("Could not attach websocket: {}", e);
        return;
    }

    let (mut outgoing, mut incoming) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(payload) = outbox.recv().await {
            if outgoing.send(Message::Text(payload.to_string())).await.is_err() {
                break;
            }
        }
    });

    // Clients never send anything meaningful, reading only tells us when they leave
    let mut reader = tokio::spawn(async move {
        while let Some(message) = incoming.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => debug!("Ignoring message from connection {}", id),
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.detach(id);
}

#[utoipa::path(
    post,
    path = "/v1/broadcast",
    tag = "events",
    request_body = Object,
    responses(
        (status = 202, description = "Message was queued for every connection"),
        (status = 400, description = "The message has no string \"type\" field")
    )
)]
pub async fn broadcast(
    State(context): State<ServerContext>,
    Json(body): Json<Value>,
) -> ServerResult<StatusCode> {
    if !body.get("type").is_some_and(Value::is_string) {
        return Err(ServerError::InvalidInput(
            "Broadcast messages need a string \"type\" field".to_string(),
        ));
    }

    context.collab.broadcast(body);
    Ok(StatusCode::ACCEPTED)
}

pub fn router() -> Router {
    Router::new().route("/", get(event_socket))
}
