//! anvil_web - Security-first, embeddable HTTP/1.1 server core with a
//! thread engine and a single-threaded reactor engine sharing one
//! connection pipeline.
//!
//! # Architecture
//!
//! - **Router**: one ordered per-method route table, recursive onion-model
//!   middleware dispatch (global middlewares, then route-specific ones,
//!   then the handler) via [`router::Next`].
//! - **Buffer pool**: fixed-capacity, stable-address buffers shared across
//!   connections so no per-request heap allocation is needed for the data
//!   a connection reads and writes.
//! - **Two engines, one pipeline**: [`server::thread`] spawns one task per
//!   connection; [`server::reactor`] drives every connection's state
//!   machine (`Reading` → `Processing` → `Writing` → `Closing`) on a single
//!   dedicated thread. Both call into [`server::connection`] for the
//!   actual read/parse/dispatch/write work, so the two only differ in how
//!   connections are scheduled, never in how one is served.
//! - **Security-first defaults**: every hard bound in [`limits::constants`]
//!   is enforced unconditionally by the parser, independent of whatever a
//!   deployment sets in [`limits::ReqLimits`] for buffer-size planning.
//!
//! # Quick start
//!
//! ```no_run
//! use anvil_web::{middleware, Context, StatusCode, Router, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut router = Router::new();
//!     router.use_middleware(middleware::logger());
//!     router.get("/", Arc::new(|ctx: &mut Context<'_>| {
//!         Box::pin(async move {
//!             ctx.text(StatusCode::Ok, b"Hello, world!".to_vec());
//!             Ok(())
//!         })
//!     }));
//!
//!     Server::builder()
//!         .router(router)
//!         .build()
//!         .unwrap()
//!         .launch()
//!         .await;
//! }
//! ```

pub mod buffer_pool;
pub mod config;
pub mod context;
pub mod errors;
pub mod http {
    pub mod query;
    pub mod request;
    pub mod response;
    pub mod types;
}
pub mod limits;
pub mod middleware;
pub mod router;
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod reactor;
    pub(crate) mod server_impl;
    pub(crate) mod thread;
}

/// Test-only byte-slice-to-`&str` helpers shared by the `http` module's
/// unit tests, so each test doesn't repeat its own `from_utf8(..).unwrap()`.
#[doc(hidden)]
#[cfg(test)]
pub(crate) mod tools {
    use std::str::from_utf8;

    #[inline]
    pub(crate) fn str_2<'a>(value: (&'a [u8], &'a [u8])) -> (&'a str, &'a str) {
        (from_utf8(value.0).unwrap(), from_utf8(value.1).unwrap())
    }
}

pub use crate::{
    context::Context,
    errors::{HandlerError, ParseError, RouteError, ServerError},
    http::{
        query,
        request::HttpRequest,
        response::{Cookie, HttpResponse, SameSite},
        types::{HeaderMap, Method, StatusCode},
    },
    router::{HandlerFn, MiddlewareFn, Next, Route, Router, RouterGroup},
    server::server_impl::{Server, ServerBuilder},
};
