pub mod admin_handlers;
pub mod health_handlers;
pub mod resolve_handlers;
pub mod shortlink_handlers;
pub mod upload_handlers;
