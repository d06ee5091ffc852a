use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use jukebox_collab::TransportKind;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTrackSchema {
    /// A track id, or a link to a track
    #[validate(length(min = 1, max = 512))]
    pub reference: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionSchema {
    pub position: i64,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationSchema {
    #[validate(length(min = 1, max = 1024))]
    pub message: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSchema {
    #[validate(length(min = 1, max = 1024))]
    pub text: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSettingsSchema {
    pub user_id: i64,
    #[validate(length(min = 1, max = 512))]
    pub access_token: String,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum RoomActionSchema {
    Next,
    Prev,
    Pause,
    Now,
}

impl From<RoomActionSchema> for TransportKind {
    fn from(value: RoomActionSchema) -> Self {
        match value {
            RoomActionSchema::Next => Self::Next,
            RoomActionSchema::Prev => Self::Prev,
            RoomActionSchema::Pause => Self::Pause,
            RoomActionSchema::Now => Self::Now,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Only receive events for this room. Every event is received when omitted.
    pub room: Option<String>,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
