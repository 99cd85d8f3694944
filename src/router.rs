//! Route registration, pattern matching, and middleware dispatch.
//!
//! The router owns one ordered per-method list of routes as its sole
//! source of truth — no separate flat list kept in sync with a lookup
//! map. Matching walks registered routes in registration order and
//! returns the first match; callers are expected to register specific
//! routes before generic ones.

use crate::{
    context::Context,
    errors::{RouteError, ServerError},
    http::types::Method,
    limits::constants::MAX_PATH_DEPTH,
};
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

/// A boxed, `Send` future, used throughout the middleware and handler ABI
/// so both can be stored as trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A route handler: the terminal step of a middleware chain.
pub type HandlerFn =
    Arc<dyn for<'a> Fn(&'a mut Context<'_>) -> BoxFuture<'a, Result<(), ServerError>> + Send + Sync>;

/// A middleware: runs around the rest of the chain via [`Next`].
pub type MiddlewareFn = Arc<
    dyn for<'a> Fn(&'a mut Context<'_>, Next<'a>) -> BoxFuture<'a, Result<(), ServerError>>
        + Send
        + Sync,
>;

/// The remainder of a middleware chain, passed to each middleware so it can
/// invoke what comes after it.
///
/// Carries an index implicitly via slice position rather than a counter:
/// each `Next` borrows the tail of the middleware list still to run, plus
/// the handler that terminates the chain. Calling [`Next::run`] peels off
/// the first remaining middleware (or, once none remain, invokes the
/// handler) — the recursive onion-model dispatch described for the router.
pub struct Next<'a> {
    middlewares: &'a [MiddlewareFn],
    handler: &'a HandlerFn,
}

impl<'a> Next<'a> {
    /// Builds a chain directly from a middleware slice and a handler,
    /// bypassing [`Router::dispatch`]. Exposed for middleware unit tests
    /// that exercise a single middleware in isolation.
    #[cfg(test)]
    pub(crate) fn new_for_test(middlewares: &'a [MiddlewareFn], handler: &'a HandlerFn) -> Self {
        Self { middlewares, handler }
    }

    /// Invokes the next middleware in the chain, or the handler if none remain.
    pub fn run(self, ctx: &'a mut Context<'_>) -> BoxFuture<'a, Result<(), ServerError>> {
        match self.middlewares.split_first() {
            Some((middleware, rest)) => {
                let middleware = Arc::clone(middleware);
                let next = Next { middlewares: rest, handler: self.handler };
                Box::pin(async move { middleware(ctx, next).await })
            }
            None => (self.handler)(ctx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

#[derive(Clone)]
struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        let segments = split_segments(raw)
            .map(|segment| match segment {
                "*" => Segment::Wildcard,
                _ if segment.starts_with(':') => Segment::Param(segment[1..].to_string()),
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();

        Self { raw: raw.to_string(), segments }
    }

    /// Matches `path_segments` against this pattern, returning the
    /// extracted `:name` parameters on success.
    fn matches(&self, path_segments: &[&str]) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut path = path_segments.iter();

        for segment in &self.segments {
            match segment {
                Segment::Wildcard => return Some(params),
                Segment::Param(name) => {
                    let value = path.next()?;
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), (*value).to_string());
                }
                Segment::Literal(literal) => {
                    if path.next()? != literal {
                        return None;
                    }
                }
            }
        }

        if path.next().is_some() {
            return None;
        }
        Some(params)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// One registered endpoint: a pattern, its handler, and the middlewares
/// that apply only to this route (in addition to the router's global ones).
pub struct Route {
    pattern: Pattern,
    handler: HandlerFn,
    middlewares: Vec<MiddlewareFn>,
}

impl Route {
    /// The path template this route was registered with, e.g. `/users/:id`.
    pub fn pattern(&self) -> &str {
        &self.pattern.raw
    }
}

/// Stores routes indexed by method, a list of global middlewares, and
/// dispatches matched requests through the full onion-model chain.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
    global_middlewares: Vec<MiddlewareFn>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a global middleware, run before every request regardless
    /// of which route matches.
    pub fn use_middleware(&mut self, middleware: MiddlewareFn) -> &mut Self {
        self.global_middlewares.push(middleware);
        self
    }

    /// Registers a route with no route-specific middlewares.
    pub fn route(&mut self, method: Method, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route_with(method, pattern, Vec::new(), handler)
    }

    /// Registers a route with its own middlewares, run after the router's
    /// global middlewares and before the handler.
    pub fn route_with(
        &mut self,
        method: Method,
        pattern: &str,
        middlewares: Vec<MiddlewareFn>,
        handler: HandlerFn,
    ) -> &mut Self {
        self.routes.entry(method).or_default().push(Route {
            pattern: Pattern::parse(pattern),
            handler,
            middlewares,
        });
        self
    }

    pub fn get(&mut self, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route(Method::Put, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route(Method::Delete, pattern, handler)
    }

    /// Opens a prefix-scoped group of routes. Every route registered
    /// through the returned [`RouterGroup`] has `prefix` prepended to its
    /// pattern and carries the group's middlewares in addition to its own.
    pub fn group<'r>(&'r mut self, prefix: &str) -> RouterGroup<'r> {
        RouterGroup { router: self, prefix: prefix.to_string(), middlewares: Vec::new() }
    }

    /// Finds the first route registered for `method` whose pattern matches
    /// `path`, in registration order.
    fn find(&self, method: Method, path_segments: &[&str]) -> Result<(&Route, HashMap<String, String>), RouteError> {
        self.routes
            .get(&method)
            .into_iter()
            .flatten()
            .find_map(|route| route.pattern.matches(path_segments).map(|params| (route, params)))
            .ok_or(RouteError::NotFound)
    }

    /// Matches the request in `ctx` against the registered routes and runs
    /// the full middleware chain (global, then route-specific) followed by
    /// the handler.
    pub async fn dispatch(&self, ctx: &mut Context<'_>) -> Result<(), ServerError> {
        let method = ctx.request().method();
        let path_segments: Vec<&str> = ctx.request().path_segments().collect();

        if path_segments.len() > MAX_PATH_DEPTH {
            return Err(RouteError::PathTooDeep.into());
        }

        let (route, params) = self.find(method, &path_segments)?;
        ctx.set_params(params);

        let mut chain = self.global_middlewares.clone();
        chain.extend(route.middlewares.iter().cloned());
        let handler = Arc::clone(&route.handler);

        let next = Next { middlewares: &chain, handler: &handler };
        next.run(ctx).await
    }
}

/// A prefix-and-middleware scope for registering related routes together.
///
/// Borrows the parent [`Router`] rather than owning any routes itself;
/// every registration call forwards straight into the parent.
pub struct RouterGroup<'r> {
    router: &'r mut Router,
    prefix: String,
    middlewares: Vec<MiddlewareFn>,
}

impl<'r> RouterGroup<'r> {
    /// Adds a middleware applied to every route registered through this
    /// group (and any nested groups opened from it).
    pub fn use_middleware(&mut self, middleware: MiddlewareFn) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    /// Opens a nested group, concatenating `prefix` onto this group's
    /// prefix and inheriting its middlewares.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        RouterGroup {
            router: self.router,
            prefix: join_prefix(&self.prefix, prefix),
            middlewares: self.middlewares.clone(),
        }
    }

    pub fn route(&mut self, method: Method, pattern: &str, handler: HandlerFn) -> &mut Self {
        let full_pattern = join_prefix(&self.prefix, pattern);
        self.router.route_with(method, &full_pattern, self.middlewares.clone(), handler);
        self
    }

    pub fn get(&mut self, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route(Method::Put, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: HandlerFn) -> &mut Self {
        self.route(Method::Delete, pattern, handler)
    }
}

fn join_prefix(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let pattern = pattern.trim_start_matches('/');
    format!("{prefix}/{pattern}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::StatusCode;

    fn handler(body: &'static str) -> HandlerFn {
        Arc::new(move |ctx: &mut Context<'_>| {
            Box::pin(async move {
                ctx.text(StatusCode::Ok, body.as_bytes().to_vec());
                Ok(())
            })
        })
    }

    fn echo_param_handler(name: &'static str) -> HandlerFn {
        Arc::new(move |ctx: &mut Context<'_>| {
            Box::pin(async move {
                let value = ctx.param(name).unwrap_or("").to_string();
                ctx.text(StatusCode::Ok, value.into_bytes());
                Ok(())
            })
        })
    }

    async fn run<'a>(router: &Router, raw_request: &'a [u8]) -> (Result<(), ServerError>, Context<'a>) {
        let request = crate::http::request::parse(raw_request).unwrap();
        let mut ctx = Context::new(request);
        let result = router.dispatch(&mut ctx).await;
        (result, ctx)
    }

    #[tokio::test]
    async fn matches_literal_route() {
        let mut router = Router::new();
        router.get("/", handler("hi"));

        let (result, mut ctx) = run(&router, b"GET / HTTP/1.1\r\n\r\n").await;
        result.unwrap();
        let text = String::from_utf8(ctx.response().build()).unwrap();
        assert!(text.ends_with("hi"));
    }

    #[tokio::test]
    async fn captures_named_parameter() {
        let mut router = Router::new();
        router.get("/users/:id", echo_param_handler("id"));

        let (result, mut ctx) = run(&router, b"GET /users/42 HTTP/1.1\r\n\r\n").await;
        result.unwrap();
        let body = ctx.response().build();
        let text = String::from_utf8(body).unwrap();
        assert!(text.ends_with("42"));
    }

    #[tokio::test]
    async fn wildcard_matches_remainder() {
        let mut router = Router::new();
        router.get("/static/*", handler("file"));

        let (result, _ctx) = run(&router, b"GET /static/css/app.css HTTP/1.1\r\n\r\n").await;
        result.unwrap();
    }

    #[tokio::test]
    async fn unmatched_path_is_not_found() {
        let router = Router::new();
        let (result, _ctx) = run(&router, b"GET /missing HTTP/1.1\r\n\r\n").await;
        assert!(matches!(result.unwrap_err(), ServerError::Route(RouteError::NotFound)));
    }

    #[tokio::test]
    async fn first_registration_wins_on_overlapping_patterns() {
        let mut router = Router::new();
        router.get("/users/:id", handler("specific"));
        router.get("/users/*", handler("generic"));

        let (result, mut ctx) = run(&router, b"GET /users/7 HTTP/1.1\r\n\r\n").await;
        result.unwrap();
        let text = String::from_utf8(ctx.response().build()).unwrap();
        assert!(text.ends_with("specific"));
    }

    #[tokio::test]
    async fn path_deeper_than_max_depth_is_rejected() {
        let router = Router::new();
        let mut path = String::new();
        for i in 0..=crate::limits::constants::MAX_PATH_DEPTH {
            path.push_str(&format!("/seg{i}"));
        }
        let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
        let (result, _ctx) = run(&router, raw.as_bytes()).await;
        assert!(matches!(result.unwrap_err(), ServerError::Route(RouteError::PathTooDeep)));
    }

    #[tokio::test]
    async fn middleware_runs_before_and_after_the_handler() {
        let mut router = Router::new();
        router.use_middleware(Arc::new(|ctx: &mut Context<'_>, next: Next<'_>| {
            Box::pin(async move {
                ctx.set_state("entered", true);
                let result = next.run(ctx).await;
                ctx.set_state("left", true);
                result
            })
        }));
        router.get("/", handler("hi"));

        let (result, ctx) = run(&router, b"GET / HTTP/1.1\r\n\r\n").await;
        result.unwrap();
        assert_eq!(ctx.state::<bool>("entered"), Some(&true));
        assert_eq!(ctx.state::<bool>("left"), Some(&true));
    }

    #[tokio::test]
    async fn short_circuiting_middleware_skips_the_handler() {
        let mut router = Router::new();
        router.use_middleware(Arc::new(|ctx: &mut Context<'_>, _next: Next<'_>| {
            Box::pin(async move {
                ctx.text(StatusCode::Forbidden, b"nope".to_vec());
                Ok(())
            })
        }));
        router.get("/", handler("hi"));

        let (result, mut ctx) = run(&router, b"GET / HTTP/1.1\r\n\r\n").await;
        result.unwrap();
        assert_eq!(ctx.response().status(), StatusCode::Forbidden);
        let text = String::from_utf8(ctx.response().build()).unwrap();
        assert!(text.ends_with("nope"));
    }

    #[tokio::test]
    async fn groups_prepend_prefix_and_inherit_middleware() {
        let mut router = Router::new();
        {
            let mut api = router.group("/api");
            api.use_middleware(Arc::new(|ctx: &mut Context<'_>, next: Next<'_>| {
                Box::pin(async move {
                    ctx.set_state("in_api_group", true);
                    next.run(ctx).await
                })
            }));
            api.get("/ping", handler("pong"));
        }

        let (result, ctx) = run(&router, b"GET /api/ping HTTP/1.1\r\n\r\n").await;
        result.unwrap();
        assert_eq!(ctx.state::<bool>("in_api_group"), Some(&true));
    }
}
