use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;

use crate::store::{Item, SharedItemStore, StoreError};

/// Failures surfaced by the item routes as `{"message": ...}` bodies.
#[derive(Debug, Error)]
pub enum ItemsError {
    #[error("Item not found")]
    NotFound,
    #[error("Item update must be a JSON object")]
    InvalidUpdate,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ItemsError {
    fn into_response(self) -> Response {
        let status = match &self {
            ItemsError::NotFound => StatusCode::NOT_FOUND,
            ItemsError::InvalidUpdate => StatusCode::BAD_REQUEST,
            ItemsError::Store(err) => {
                tracing::error!(error = %err, "item store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

// Non-integer ids can never match a stored item.
fn parse_id(raw: &str) -> Result<i64, ItemsError> {
    raw.parse().map_err(|_| ItemsError::NotFound)
}

/// `POST /items`
pub async fn create_item(
    State(store): State<SharedItemStore>,
    Json(item): Json<Item>,
) -> Result<(StatusCode, Json<Item>), ItemsError> {
    let item = store.insert(item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `GET /items`
pub async fn list_items(
    State(store): State<SharedItemStore>,
) -> Result<Json<Vec<Item>>, ItemsError> {
    Ok(Json(store.list().await?))
}

/// `GET /items/{id}`
pub async fn get_item(
    State(store): State<SharedItemStore>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ItemsError> {
    let id = parse_id(&id)?;
    store.get(id).await?.map(Json).ok_or(ItemsError::NotFound)
}

/// `PUT /items/{id}`
pub async fn update_item(
    State(store): State<SharedItemStore>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<Item>, ItemsError> {
    let id = parse_id(&id)?;
    let Value::Object(patch) = patch else {
        return Err(ItemsError::InvalidUpdate);
    };
    store.put(id, patch).await?.map(Json).ok_or(ItemsError::NotFound)
}

/// `DELETE /items/{id}`
pub async fn delete_item(
    State(store): State<SharedItemStore>,
    Path(id): Path<String>,
) -> Result<StatusCode, ItemsError> {
    if let Ok(id) = id.parse::<i64>() {
        store.delete(id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
