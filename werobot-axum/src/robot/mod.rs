//! WeChat robot primitives consumed by the endpoint binder.
//!
//! - `signature`: token format and callback signature checks
//! - `message`: decoding of incoming XML messages
//! - `reply`: reply model and XML serialization
//! - `base`: handler registry resolving messages into replies

pub mod base;
pub mod message;
pub mod reply;
pub mod signature;

pub use base::{BaseRobot, Handler};
pub use message::{parse_user_msg, EventKind, Message, MessageKind};
pub use reply::{create_reply, Article, Reply, REPLY_CONTENT_TYPE};
pub use signature::{check_signature, check_token, sign};
