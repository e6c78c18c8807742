// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! JSON-RPC 2.0 method dispatch.
//!
//! The handler is a name-indexed table of method and notification handlers,
//! filled once at startup and shared read-only afterwards. Session gating
//! happens before dispatch, in the protocol engine.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use super::error::JsonRpcError;
use super::types::{Id, Request, Response};
use crate::session::Session;
use crate::tools::CredentialOverrides;

/// Per-request information handed to method handlers.
#[derive(Debug, Clone, Default)]
pub struct MethodContext {
    /// The resolved session; absent only for notifications sent without one
    pub session: Option<Session>,

    /// Credential overrides taken from the request headers
    pub overrides: CredentialOverrides,
}

impl MethodContext {
    /// Id of the resolved session, or an empty string.
    pub fn session_id(&self) -> &str {
        self.session.as_ref().map(|s| s.id.as_str()).unwrap_or_default()
    }
}

/// Type alias for method handler response.
pub type MethodResult = std::result::Result<Value, JsonRpcError>;

/// Type alias for method handler's future return type.
pub type MethodHandlerFuture = BoxFuture<'static, MethodResult>;

/// Type alias for shared method handlers.
pub type MethodHandlerFn = Arc<dyn MethodHandler + Send + Sync>;

/// Type alias for shared notification handlers.
pub type NotificationHandlerFn =
    Arc<dyn Fn(Option<Value>, MethodContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// Trait for method handlers to implement.
pub trait MethodHandler {
    /// Handles a method call asynchronously.
    fn handle(&self, params: Option<Value>, context: MethodContext) -> MethodHandlerFuture;
}

impl<F, Fut> MethodHandler for F
where
    F: Send + Sync + 'static + Fn(Option<Value>, MethodContext) -> Fut,
    Fut: Future<Output = MethodResult> + Send + 'static,
{
    fn handle(&self, params: Option<Value>, context: MethodContext) -> MethodHandlerFuture {
        Box::pin((self)(params, context))
    }
}

/// Dispatcher for JSON-RPC 2.0 requests and notifications.
#[derive(Default, Clone)]
pub struct JsonRpcHandler {
    methods: HashMap<String, MethodHandlerFn>,
    notifications: HashMap<String, NotificationHandlerFn>,
}

impl std::fmt::Debug for JsonRpcHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        let mut notifications: Vec<_> = self.notifications.keys().collect();
        notifications.sort();
        f.debug_struct("JsonRpcHandler")
            .field("methods", &methods)
            .field("notifications", &notifications)
            .finish()
    }
}

impl JsonRpcHandler {
    /// Creates an empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a method handler function, replacing any earlier one.
    pub fn register_method<F, Fut>(&mut self, method: impl Into<String>, handler: F)
    where
        F: Send + Sync + 'static + Fn(Option<Value>, MethodContext) -> Fut,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        self.methods
            .insert(method.into(), Arc::new(handler) as MethodHandlerFn);
    }

    /// Registers a notification handler function, replacing any earlier one.
    pub fn register_notification<F, Fut>(&mut self, method: impl Into<String>, handler: F)
    where
        F: Send + Sync + 'static + Fn(Option<Value>, MethodContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: NotificationHandlerFn = Arc::new(
            move |params: Option<Value>, ctx: MethodContext| -> BoxFuture<'static, ()> {
                Box::pin(handler(params, ctx))
            },
        );
        self.notifications.insert(method.into(), boxed);
    }

    /// Returns true if a method with this name is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Dispatches a request that carries an id and builds its response.
    pub async fn dispatch(&self, request: Request, context: MethodContext) -> Response {
        let id = request.id.unwrap_or(Id::Null);
        let Some(handler) = self.methods.get(&request.method) else {
            return Response::error(id, JsonRpcError::method_not_found(&request.method));
        };
        let outcome = handler.handle(request.params, context).await;
        Response::from_result(id, outcome)
    }

    /// Runs the handler of a notification, if there is one.
    pub async fn notify(&self, request: Request, context: MethodContext) {
        match self.notifications.get(&request.method) {
            Some(handler) => handler(request.params, context).await,
            None => debug!(method = %request.method, "Ignoring unknown notification"),
        }
    }
}
