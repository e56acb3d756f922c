//! Item CRUD endpoints under `/api/v1/items`.
//!
//! Every handler takes [`RequireApiKey`] as its first argument, so the API key
//! is checked before the path id or JSON body is parsed and before the store
//! is locked.
//!
//! Path ids are taken as signed integers; ids that can never have been
//! assigned (zero or negative) answer 404 like any other missing item.
//! Payloads are accepted as long as they deserialize.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tracing::{info, instrument};

use crate::error::AppResult;
use crate::metrics;
use crate::middleware::RequireApiKey;
use crate::models::{Item, ItemPayload, ListItemsQuery};
use crate::state::AppState;
use crate::store::{ListParams, item_key};

/// Create a new item.
#[instrument(skip(_auth, state, payload))]
pub async fn create_item(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Json(payload): Json<ItemPayload>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let mut store = state.store.write().await;
    let item = store.create(payload.name, payload.description);
    let stored = store.len();
    drop(store);

    metrics::record_item_created();
    metrics::set_items_stored(stored);
    info!(item_id = item.id, "Item created");

    Ok((StatusCode::CREATED, Json(item)))
}

/// List items in insertion order.
///
/// `limit` defaults to the configured page size, `offset` to 0; negative
/// values are clamped to 0.
#[instrument(skip(_auth, state))]
pub async fn list_items(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Query(query): Query<ListItemsQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let params = ListParams::from_query(
        query.limit,
        query.offset,
        state.config.list_default_limit,
    );

    let items = state.store.read().await.list(params);
    Ok(Json(items))
}

/// Get a single item by id.
#[instrument(skip(_auth, state))]
pub async fn get_item(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Item>> {
    let item = state.store.read().await.get(item_key(id)?)?;
    Ok(Json(item))
}

/// Replace the name and description of an existing item.
#[instrument(skip(_auth, state, payload))]
pub async fn update_item(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ItemPayload>,
) -> AppResult<Json<Item>> {
    let id = item_key(id)?;
    let item = state
        .store
        .write()
        .await
        .update(id, payload.name, payload.description)?;

    info!(item_id = id, "Item updated");
    Ok(Json(item))
}

/// Delete an item by id.
#[instrument(skip(_auth, state))]
pub async fn delete_item(
    _auth: RequireApiKey,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let id = item_key(id)?;
    let mut store = state.store.write().await;
    store.delete(id)?;
    let stored = store.len();
    drop(store);

    metrics::record_item_deleted();
    metrics::set_items_stored(stored);
    info!(item_id = id, "Item deleted");

    Ok(StatusCode::NO_CONTENT)
}
