//! WeChat webhook request handler.
//!
//! Every callback goes through the same steps:
//! 1. Verify the signature carried in the query string
//! 2. GET: answer the verification handshake with `echostr`
//! 3. POST: parse the message, resolve a reply, serialize it

use std::sync::Arc;

use axum::http::Method;
use tracing::{info, warn};

use crate::error::HandlerError;
use crate::robot::{create_reply, parse_user_msg, BaseRobot};
use crate::web::host::{RouteHandler, WebhookRequest, WebhookResponse};

/// Body returned for requests whose signature does not verify.
pub const INVALID_REQUEST: &str = "Invalid Request.";

/// Build the route handler for `robot`, verifying signatures against `token`.
pub fn webhook_handler(robot: Arc<BaseRobot>, token: String) -> RouteHandler {
    Arc::new(move |request| handle_webhook(&robot, &token, request))
}

/// Serve one webhook request.
pub fn handle_webhook(
    robot: &BaseRobot,
    token: &str,
    request: WebhookRequest,
) -> Result<WebhookResponse, HandlerError> {
    if !robot.check_signature(
        token,
        request.arg("timestamp"),
        request.arg("nonce"),
        request.arg("signature"),
    ) {
        warn!(method = %request.method, "werobot_signature_invalid");
        return Ok(WebhookResponse::text(INVALID_REQUEST));
    }

    if request.method == Method::GET {
        info!(has_echostr = request.query.contains_key("echostr"), "werobot_handshake");
        return Ok(WebhookResponse::text(request.arg("echostr")));
    }

    let message = parse_user_msg(&request.body)?;

    let Some(reply) = robot.get_reply(&message) else {
        info!(msg_type = %message.type_name(), "werobot_no_reply");
        return Ok(WebhookResponse::empty());
    };

    info!(
        msg_type = %message.type_name(),
        reply_type = reply.msg_type(),
        "werobot_replied"
    );

    Ok(WebhookResponse::xml(create_reply(&reply, &message)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::body::Bytes;

    use super::*;
    use crate::error::ParseError;
    use crate::robot::{sign, Reply};

    const TOKEN: &str = "testtoken";
    const TEXT_MESSAGE: &str = "<xml><ToUserName><![CDATA[gh_robot]]></ToUserName>\
        <FromUserName><![CDATA[o_user]]></FromUserName><CreateTime>1348831860</CreateTime>\
        <MsgType><![CDATA[text]]></MsgType><Content><![CDATA[hello]]></Content>\
        <MsgId>1234567890123456</MsgId></xml>";

    fn request(method: Method, token: &str, extra: &[(&str, &str)], body: &str) -> WebhookRequest {
        let mut query: HashMap<String, String> = HashMap::from([
            ("timestamp".to_string(), "1400000000".to_string()),
            ("nonce".to_string(), "nonce42".to_string()),
            ("signature".to_string(), sign(token, "1400000000", "nonce42")),
        ]);
        for (k, v) in extra {
            query.insert(k.to_string(), v.to_string());
        }
        WebhookRequest {
            method,
            query,
            body: Bytes::from(body.to_string()),
        }
    }

    fn echo_robot() -> BaseRobot {
        let mut robot = BaseRobot::new();
        robot.text(|m| m.content().map(Reply::text));
        robot
    }

    #[test]
    fn test_invalid_signature_rejected_for_any_method() {
        let robot = echo_robot();
        for method in [Method::GET, Method::POST] {
            let response =
                handle_webhook(&robot, TOKEN, request(method, "wrongtoken", &[], TEXT_MESSAGE))
                    .unwrap();
            assert_eq!(response.body, INVALID_REQUEST);
        }
    }

    #[test]
    fn test_missing_signature_rejected() {
        let robot = echo_robot();
        let request = WebhookRequest {
            method: Method::POST,
            query: HashMap::new(),
            body: Bytes::from_static(b"not even xml"),
        };
        let response = handle_webhook(&robot, TOKEN, request).unwrap();
        assert_eq!(response.body, INVALID_REQUEST);
    }

    #[test]
    fn test_missing_timestamp_and_nonce_still_verified() {
        let robot = echo_robot();
        let request = WebhookRequest {
            method: Method::GET,
            query: HashMap::from([
                ("signature".to_string(), sign(TOKEN, "", "")),
                ("echostr".to_string(), "hi".to_string()),
            ]),
            body: Bytes::new(),
        };
        let response = handle_webhook(&robot, TOKEN, request).unwrap();
        assert_eq!(response.body, "hi");
    }

    #[test]
    fn test_get_echoes_challenge() {
        let robot = echo_robot();
        let response =
            handle_webhook(&robot, TOKEN, request(Method::GET, TOKEN, &[("echostr", "challenge")], ""))
                .unwrap();
        assert_eq!(response, WebhookResponse::text("challenge"));
    }

    #[test]
    fn test_get_without_echostr_is_empty() {
        let robot = echo_robot();
        let response = handle_webhook(&robot, TOKEN, request(Method::GET, TOKEN, &[], "")).unwrap();
        assert_eq!(response.body, "");
    }

    #[test]
    fn test_post_without_reply_is_empty() {
        let robot = BaseRobot::new();
        let response =
            handle_webhook(&robot, TOKEN, request(Method::POST, TOKEN, &[], TEXT_MESSAGE)).unwrap();
        assert_eq!(response, WebhookResponse::empty());
    }

    #[test]
    fn test_post_with_reply_is_xml() {
        let robot = echo_robot();
        let response =
            handle_webhook(&robot, TOKEN, request(Method::POST, TOKEN, &[], TEXT_MESSAGE)).unwrap();

        assert_eq!(response.content_type, "application/xml");
        assert!(response.body.starts_with(
            "<xml><ToUserName><![CDATA[o_user]]></ToUserName><FromUserName><![CDATA[gh_robot]]></FromUserName>"
        ));
        assert!(response.body.contains("<Content><![CDATA[hello]]></Content>"));
    }

    #[test]
    fn test_post_malformed_body_is_error() {
        let robot = echo_robot();
        let result = handle_webhook(&robot, TOKEN, request(Method::POST, TOKEN, &[], ""));
        assert!(matches!(result, Err(HandlerError::Parse(ParseError::Empty))));
    }

    #[test]
    fn test_webhook_handler_captures_token() {
        let handler = webhook_handler(Arc::new(echo_robot()), TOKEN.to_string());
        let response = handler(request(Method::GET, TOKEN, &[("echostr", "ok")], "")).unwrap();
        assert_eq!(response.body, "ok");
    }
}
