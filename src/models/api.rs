//! Request and response bodies for the HTTP API.
//!
//! Payload fields are taken as sent: any string is a valid name or
//! description once the JSON itself deserializes.

use serde::{Deserialize, Serialize};

/// A stored item as returned by every item endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Sequential identifier, assigned on creation and never reused
    pub id: u64,
    /// Item name
    pub name: String,
    /// Free-form description (empty when not provided)
    pub description: String,
}

/// Request body for creating or replacing an item.
///
/// The same shape is used by `POST` and `PATCH`; a `PATCH` replaces both
/// fields, so an omitted `description` resets it to the empty string.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemPayload {
    /// Item name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: String,
}

/// Query string accepted by `GET /api/v1/items`.
///
/// Values are signed so that negative inputs reach the clamping logic in
/// [`ListParams`](crate::store::ListParams) instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct ListItemsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: String,
}
