mod api;

pub use api::{HealthResponse, Item, ItemPayload, ListItemsQuery};
