//! Robot core: token and reply handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::message::Message;
use super::reply::Reply;
use super::signature::check_signature;

/// A reply handler. Returning `None` passes the message on to the next handler.
pub type Handler = Arc<dyn Fn(&Message) -> Option<Reply> + Send + Sync>;

/// Token plus the handler registry that turns messages into replies.
///
/// Build the robot fully before binding it; once bound it is shared
/// read-only between requests.
#[derive(Clone, Default)]
pub struct BaseRobot {
    token: Option<String>,
    handlers: HashMap<String, Vec<Handler>>,
    catch_all: Vec<Handler>,
}

impl fmt::Debug for BaseRobot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseRobot")
            .field("token_set", &self.token.is_some())
            .field("handler_types", &self.handlers.keys().collect::<Vec<_>>())
            .field("catch_all", &self.catch_all.len())
            .finish()
    }
}

impl BaseRobot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Register a handler for one message type, as named by
    /// [`Message::type_name`] (`text`, `image`, `subscribe`, `click`, ...).
    ///
    /// Any other event (e.g. `scancode_push`) is routed by its lower-cased name.
    pub fn add_handler<F>(&mut self, msg_type: &str, handler: F) -> &mut Self
    where
        F: Fn(&Message) -> Option<Reply> + Send + Sync + 'static,
    {
        self.handlers
            .entry(msg_type.to_ascii_lowercase())
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Register a handler that sees every message after the typed handlers.
    pub fn add_catch_all<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Message) -> Option<Reply> + Send + Sync + 'static,
    {
        self.catch_all.push(Arc::new(handler));
        self
    }

    pub fn text<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Message) -> Option<Reply> + Send + Sync + 'static,
    {
        self.add_handler("text", handler)
    }

    pub fn subscribe<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Message) -> Option<Reply> + Send + Sync + 'static,
    {
        self.add_handler("subscribe", handler)
    }

    pub fn click<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Message) -> Option<Reply> + Send + Sync + 'static,
    {
        self.add_handler("click", handler)
    }

    /// First reply produced by the handlers registered for `message`.
    pub fn get_reply(&self, message: &Message) -> Option<Reply> {
        let msg_type = message.type_name();
        let typed = self.handlers.get(msg_type).into_iter().flatten();

        let reply = typed
            .chain(self.catch_all.iter())
            .find_map(|handler| handler(message));

        debug!(
            msg_type = %msg_type,
            has_reply = reply.is_some(),
            "werobot_reply_resolved"
        );

        reply
    }

    /// Check a callback signature against `token`.
    pub fn check_signature(&self, token: &str, timestamp: &str, nonce: &str, signature: &str) -> bool {
        check_signature(token, timestamp, nonce, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::message::parse_user_msg;

    fn message(msg_type: &str, extra: &str) -> Message {
        let xml = format!(
            "<xml><ToUserName>gh</ToUserName><FromUserName>u</FromUserName>\
             <CreateTime>1</CreateTime><MsgType>{msg_type}</MsgType>{extra}</xml>"
        );
        parse_user_msg(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_no_handlers_no_reply() {
        let robot = BaseRobot::new();
        assert_eq!(robot.get_reply(&message("text", "<Content>hi</Content>")), None);
    }

    #[test]
    fn test_typed_handler_before_catch_all() {
        let mut robot = BaseRobot::new();
        robot
            .add_catch_all(|_| Some(Reply::text("fallback")))
            .text(|m| m.content().map(|c| Reply::text(format!("echo: {c}"))));

        assert_eq!(
            robot.get_reply(&message("text", "<Content>hi</Content>")),
            Some(Reply::text("echo: hi"))
        );
        assert_eq!(
            robot.get_reply(&message("image", "<PicUrl>p</PicUrl>")),
            Some(Reply::text("fallback"))
        );
    }

    #[test]
    fn test_handlers_fall_through_on_none() {
        let mut robot = BaseRobot::new();
        robot
            .text(|_| None)
            .text(|_| Some(Reply::text("second")))
            .text(|_| Some(Reply::text("third")));

        assert_eq!(
            robot.get_reply(&message("text", "<Content>x</Content>")),
            Some(Reply::text("second"))
        );
    }

    #[test]
    fn test_event_handlers() {
        let mut robot = BaseRobot::new();
        robot
            .subscribe(|_| Some(Reply::text("welcome")))
            .click(|_| Some(Reply::text("clicked")))
            .add_handler("SCANCODE_PUSH", |_| Some(Reply::text("scanned")));

        assert_eq!(
            robot.get_reply(&message("event", "<Event>subscribe</Event>")),
            Some(Reply::text("welcome"))
        );
        assert_eq!(
            robot.get_reply(&message("event", "<Event>CLICK</Event><EventKey>k</EventKey>")),
            Some(Reply::text("clicked"))
        );
        assert_eq!(
            robot.get_reply(&message("event", "<Event>scancode_push</Event>")),
            Some(Reply::text("scanned"))
        );
        assert_eq!(robot.get_reply(&message("event", "<Event>unsubscribe</Event>")), None);
    }

    #[test]
    fn test_token() {
        assert_eq!(BaseRobot::new().token(), None);
        assert_eq!(BaseRobot::new().with_token("abc123").token(), Some("abc123"));
    }
}
