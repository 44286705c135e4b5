use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json,
};
use encore_core::{NewSong, PrimaryKey, SongData, UpdatedSong};
use serde_json::{json, Value};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{NewSongSchema, UpdateSongSchema, ValidatedJson},
    Router,
};

async fn list_songs(State(context): State<ServerContext>) -> ServerResult<Json<Vec<SongData>>> {
    let songs = context.encore.catalog.list().await?;

    Ok(Json(songs))
}

async fn create_song(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewSongSchema>,
) -> ServerResult<Json<SongData>> {
    let song = context
        .encore
        .catalog
        .create(NewSong {
            title: body.title,
            artist: body.artist,
            youtube: body.youtube,
            category: body.category,
            favorite: body.favorite,
            key: body.key,
        })
        .await?;

    Ok(Json(song))
}

async fn update_song(
    State(context): State<ServerContext>,
    Path(id): Path<PrimaryKey>,
    Json(body): Json<UpdateSongSchema>,
) -> ServerResult<Json<SongData>> {
    if body.is_empty() {
        return Err(ServerError::EmptyUpdate);
    }

    let song = context
        .encore
        .catalog
        .update(UpdatedSong {
            id,
            title: body.title,
            artist: body.artist,
            youtube: body.youtube,
            category: body.category,
            favorite: body.favorite,
            key: body.key,
        })
        .await?;

    Ok(Json(song))
}

async fn delete_song(
    State(context): State<ServerContext>,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<Json<Value>> {
    context.encore.catalog.delete(id).await?;

    Ok(Json(json!({ "ok": true })))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_songs).post(create_song))
        .route("/:id", patch(update_song).delete(delete_song))
}
