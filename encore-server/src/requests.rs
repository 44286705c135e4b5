use axum::{extract::State, routing::get, Json};
use encore_core::{NewRequest, RequestData};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewRequestSchema, ValidatedJson},
    Router,
};

async fn list_requests(
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<RequestData>>> {
    let requests = context.encore.requests.list().await?;

    Ok(Json(requests))
}

async fn create_request(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRequestSchema>,
) -> ServerResult<Json<RequestData>> {
    let request = context
        .encore
        .requests
        .append(NewRequest { song: body.song })
        .await?;

    Ok(Json(request))
}

pub fn router() -> Router {
    Router::new().route("/", get(list_requests).post(create_request))
}
