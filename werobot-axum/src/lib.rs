//! WeRoBot for axum - serve a WeChat robot from an axum application.
//!
//! A host application registers one webhook route per robot. Each callback
//! is signature-checked, parsed, answered by the robot's handlers and
//! serialized back as the HTTP response.
//!
//! ## Flow
//!
//! ```text
//! WeChat → GET|POST /wechat → signature check → parse → handlers → reply XML
//! ```

pub mod config;
pub mod error;
pub mod robot;
pub mod web;

// Re-export commonly used types
pub use config::{Config, HostConfig};
pub use error::{BindError, HandlerError, ParseError};
pub use robot::{BaseRobot, Message, MessageKind, Reply};
pub use web::{AxumHost, Binding, Host, WeRobot};
