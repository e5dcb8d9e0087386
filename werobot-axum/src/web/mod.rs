//! Web integration: binds a robot to a host application's router.
//!
//! - `host`: the capability contract a host must satisfy, plus the axum adapter
//! - `binder`: `WeRobot`, the two-phase endpoint binder
//! - `handlers`: the per-request webhook handler

pub mod binder;
pub mod handlers;
pub mod host;

pub use binder::{Binding, WeRobot, WEBHOOK_METHODS};
pub use handlers::{handle_webhook, webhook_handler, INVALID_REQUEST};
pub use host::{AxumHost, Host, RouteHandler, WebhookRequest, WebhookResponse};
