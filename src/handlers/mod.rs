mod health;
mod items;

pub use health::health_check;
pub use items::{create_item, delete_item, get_item, list_items, update_item};
