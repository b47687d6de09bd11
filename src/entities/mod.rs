pub mod book;
pub mod order;
pub mod order_item;
pub mod processed_webhook_event;
pub mod user;
