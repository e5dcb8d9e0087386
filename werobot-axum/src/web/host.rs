//! Host application contract and its axum adapter.
//!
//! The binder never talks to a web framework directly. It needs a config
//! store and a way to register a handler under a URL rule; anything that
//! provides both through [`Host`] can serve a robot.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Query,
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use tracing::info;

use crate::config::HostConfig;
use crate::error::{BindError, HandlerError};
use crate::robot::REPLY_CONTENT_TYPE;

/// Framework-independent view of an incoming webhook request.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: Method,
    pub query: HashMap<String, String>,
    pub body: Bytes,
}

impl WebhookRequest {
    /// Query parameter `name`, or `""` when absent.
    pub fn arg(&self, name: &str) -> &str {
        self.query.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Body and content type written back by a webhook handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub body: String,
    pub content_type: &'static str,
}

impl WebhookResponse {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "text/plain; charset=utf-8",
        }
    }

    pub fn xml(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: REPLY_CONTENT_TYPE,
        }
    }

    pub fn empty() -> Self {
        Self::text(String::new())
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

/// Handler registered on a host for one route.
pub type RouteHandler =
    Arc<dyn Fn(WebhookRequest) -> Result<WebhookResponse, HandlerError> + Send + Sync>;

/// Capabilities a host application must offer to serve a robot.
pub trait Host {
    fn config(&self) -> &HostConfig;

    fn config_mut(&mut self) -> &mut HostConfig;

    /// Register `handler` at `rule` under the name `endpoint`.
    ///
    /// Must reject the registration without side effects if the endpoint or
    /// the rule is already taken, or if the rule is not a valid path.
    fn add_url_rule(
        &mut self,
        rule: &str,
        endpoint: &str,
        methods: &[Method],
        handler: RouteHandler,
    ) -> Result<(), BindError>;

    /// URL rule registered under `endpoint`.
    fn url_for(&self, endpoint: &str) -> Option<&str>;
}

/// Axum application acting as a robot host.
///
/// Routes are accumulated on an internal `Router` and handed out with
/// [`AxumHost::into_router`] once every robot is bound.
#[derive(Default)]
pub struct AxumHost {
    config: HostConfig,
    router: Router,
    endpoints: BTreeMap<String, String>,
}

impl AxumHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Register a plain axum route alongside the robots, e.g. a health check.
    pub fn route(
        &mut self,
        rule: &str,
        endpoint: &str,
        method_router: MethodRouter,
    ) -> Result<(), BindError> {
        self.check_free(rule, endpoint)?;
        let router = std::mem::take(&mut self.router);
        self.router = router.route(rule, method_router);
        self.endpoints.insert(endpoint.to_string(), rule.to_string());
        Ok(())
    }

    /// Registered (endpoint, rule) pairs.
    pub fn endpoints(&self) -> impl Iterator<Item = (&str, &str)> {
        self.endpoints.iter().map(|(e, r)| (e.as_str(), r.as_str()))
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    fn check_free(&self, rule: &str, endpoint: &str) -> Result<(), BindError> {
        validate_rule(rule)?;

        if let Some(existing) = self.endpoints.get(endpoint) {
            return Err(BindError::EndpointExists {
                endpoint: endpoint.to_string(),
                rule: existing.clone(),
            });
        }

        if let Some((owner, _)) = self.endpoints.iter().find(|(_, r)| r.as_str() == rule) {
            return Err(BindError::RuleExists {
                rule: rule.to_string(),
                endpoint: owner.clone(),
            });
        }

        Ok(())
    }
}

impl Host for AxumHost {
    fn config(&self) -> &HostConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut HostConfig {
        &mut self.config
    }

    fn add_url_rule(
        &mut self,
        rule: &str,
        endpoint: &str,
        methods: &[Method],
        handler: RouteHandler,
    ) -> Result<(), BindError> {
        let filter = method_filter(methods)?;

        let method_router = on(
            filter,
            move |method: Method, Query(query): Query<HashMap<String, String>>, body: Bytes| {
                let handler = handler.clone();
                async move { handler(WebhookRequest { method, query, body }) }
            },
        );

        self.route(rule, endpoint, method_router)?;

        info!(
            rule = %rule,
            endpoint = %endpoint,
            methods = ?methods,
            "host_route_registered"
        );

        Ok(())
    }

    fn url_for(&self, endpoint: &str) -> Option<&str> {
        self.endpoints.get(endpoint).map(String::as_str)
    }
}

fn method_filter(methods: &[Method]) -> Result<MethodFilter, BindError> {
    let mut filters = methods.iter().map(|method| {
        MethodFilter::try_from(method.clone())
            .map_err(|_| BindError::UnsupportedMethod(method.to_string()))
    });

    let first = filters
        .next()
        .ok_or_else(|| BindError::UnsupportedMethod("<none>".to_string()))??;

    filters.try_fold(first, |acc, filter| Ok(acc.or(filter?)))
}

/// Reject rules the router cannot serve as a static path.
fn validate_rule(rule: &str) -> Result<(), BindError> {
    let reason = if !rule.starts_with('/') {
        "must start with '/'"
    } else if rule.contains("//") {
        "must not contain empty segments"
    } else if rule.contains(|c: char| matches!(c, ':' | '*' | '{' | '}' | '?' | '#')) {
        "must be a static path"
    } else {
        return Ok(());
    };

    Err(BindError::InvalidRule {
        rule: rule.to_string(),
        reason,
    })
}
