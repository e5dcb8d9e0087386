//! Endpoint binder attaching a robot to host applications.
//!
//! A `WeRobot` starts unbound and holds only the robot configuration. Each
//! successful [`WeRobot::bind`] registers one webhook route on a host; the same
//! robot can be bound to any number of hosts, or several times to one host
//! under different endpoint names.
//!
//! ```ignore
//! let mut robot = BaseRobot::new();
//! robot.text(|m| m.content().map(Reply::text));
//!
//! let mut host = AxumHost::new(HostConfig::from_env());
//! let werobot = WeRobot::with_host(robot, &mut host, None, None)?;
//! let app = host.into_router();
//! ```

use std::sync::Arc;

use axum::http::Method;
use tracing::info;

use crate::config::{DEFAULT_ENDPOINT, DEFAULT_RULE, DEFAULT_TOKEN, RULE_KEY, TOKEN_KEY};
use crate::error::BindError;
use crate::robot::{check_token, BaseRobot};
use crate::web::handlers::webhook_handler;
use crate::web::host::Host;

/// Methods the webhook route accepts: GET for the handshake, POST for delivery.
pub const WEBHOOK_METHODS: [Method; 2] = [Method::GET, Method::POST];

/// One route registered by [`WeRobot::bind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub endpoint: String,
    pub rule: String,
}

/// Robot that can be bound to one or more host applications.
#[derive(Debug)]
pub struct WeRobot {
    robot: Arc<BaseRobot>,
    token: Option<String>,
    bindings: Vec<Binding>,
}

impl WeRobot {
    /// Create an unbound binder. Call [`WeRobot::bind`] to serve it.
    pub fn new(robot: BaseRobot) -> Self {
        Self {
            token: robot.token().map(str::to_string),
            robot: Arc::new(robot),
            bindings: Vec::new(),
        }
    }

    /// Create a binder and bind it to `host` straight away.
    pub fn with_host<H>(
        robot: BaseRobot,
        host: &mut H,
        endpoint: Option<&str>,
        rule: Option<&str>,
    ) -> Result<Self, BindError>
    where
        H: Host + ?Sized,
    {
        let mut werobot = Self::new(robot);
        werobot.bind(host, endpoint, rule)?;
        Ok(werobot)
    }

    /// Register the webhook route on `host`.
    ///
    /// `endpoint` defaults to `werobot`. Without an explicit `rule` the host
    /// config key `WEROBOT_ROLE` is used, falling back to `/wechat`. Without a
    /// token on the robot, `WEROBOT_TOKEN` is used, falling back to `none`.
    /// Fallbacks are written back into the host config.
    pub fn bind<H>(
        &mut self,
        host: &mut H,
        endpoint: Option<&str>,
        rule: Option<&str>,
    ) -> Result<&Binding, BindError>
    where
        H: Host + ?Sized,
    {
        let endpoint = endpoint.unwrap_or(DEFAULT_ENDPOINT);

        let token = match &self.token {
            Some(token) => token.clone(),
            None => host
                .config_mut()
                .get_or_insert(TOKEN_KEY, DEFAULT_TOKEN)
                .to_string(),
        };
        if !check_token(&token) {
            return Err(BindError::InvalidToken(token));
        }

        let rule = match rule {
            Some(rule) => rule.to_string(),
            None => host
                .config_mut()
                .get_or_insert(RULE_KEY, DEFAULT_RULE)
                .to_string(),
        };

        let handler = webhook_handler(Arc::clone(&self.robot), token.clone());
        host.add_url_rule(&rule, endpoint, &WEBHOOK_METHODS, handler)?;

        info!(
            endpoint = %endpoint,
            rule = %rule,
            default_token = token == DEFAULT_TOKEN,
            "werobot_bound"
        );

        self.token = Some(token);
        self.bindings.push(Binding {
            endpoint: endpoint.to_string(),
            rule,
        });

        Ok(&self.bindings[self.bindings.len() - 1])
    }

    pub fn is_bound(&self) -> bool {
        !self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Token in use, once set on the robot or resolved by a bind.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn robot(&self) -> &BaseRobot {
        &self.robot
    }
}
