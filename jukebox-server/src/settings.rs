use axum::{extract::State, http::StatusCode, routing::put};
use jukebox_collab::CatalogSettings;
use log::info;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{CatalogSettingsSchema, ValidatedJson},
    Router,
};

#[utoipa::path(
    put,
    path = "/v1/settings",
    tag = "settings",
    request_body = CatalogSettingsSchema,
    responses(
        (status = 204, description = "Catalog credentials were saved and are in use")
    )
)]
async fn save_settings(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<CatalogSettingsSchema>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .save_catalog_settings(CatalogSettings {
            user_id: body.user_id,
            access_token: body.access_token,
        })
        .await?;

    info!("Catalog credentials updated for user {}", body.user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router {
    Router::new().route("/", put(save_settings))
}
