//! The ambient middleware suite: logger, CORS, error handling, a stub
//! auth gate, IP-based rate limiting, and request IDs.
//!
//! Each function here returns a [`MiddlewareFn`] closure rather than being
//! one itself, so callers can configure it (origins, a header name) before
//! handing it to [`crate::router::Router::use_middleware`].

use crate::{
    context::Context,
    http::types::StatusCode,
    limits::constants::{MAX_REQUESTS_PER_IP_PER_MINUTE, RATE_LIMIT_WINDOW},
    router::{MiddlewareFn, Next},
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};

/// Logs method, path, status, and elapsed time for every request at
/// `info` level once the chain below it completes.
pub fn logger() -> MiddlewareFn {
    Arc::new(|ctx: &mut Context<'_>, next: Next<'_>| {
        Box::pin(async move {
            let method = ctx.request().method();
            let path = ctx.request().path().to_string();
            let start = Instant::now();

            let result = next.run(ctx).await;

            let elapsed = start.elapsed();
            let status = ctx.response().status().code();
            tracing::info!(
                %method,
                %path,
                status,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "request handled",
            );
            result
        })
    })
}

/// Adds permissive CORS headers, answering `OPTIONS` preflights directly
/// without reaching the handler.
pub fn cors(allowed_origin: impl Into<String>) -> MiddlewareFn {
    let allowed_origin = allowed_origin.into();
    Arc::new(move |ctx: &mut Context<'_>, next: Next<'_>| {
        let allowed_origin = allowed_origin.clone();
        Box::pin(async move {
            let is_preflight = ctx.request().method() == crate::http::types::Method::Options;

            let result = if is_preflight { Ok(()) } else { next.run(ctx).await };

            ctx.response()
                .set_header("Access-Control-Allow-Origin", allowed_origin)
                .set_header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, PATCH, OPTIONS")
                .set_header("Access-Control-Allow-Headers", "Content-Type, Authorization");

            if is_preflight {
                ctx.response().set_status(StatusCode::NoContent);
            }

            result
        })
    })
}

/// Catches any error returned by downstream middleware or the handler and
/// turns it into a response instead of letting it escape to the engine.
///
/// Should be the outermost (first-registered) global middleware so it
/// wraps everything else.
pub fn error_handler(json_errors: bool) -> MiddlewareFn {
    Arc::new(move |ctx: &mut Context<'_>, next: Next<'_>| {
        Box::pin(async move {
            match next.run(ctx).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    if err.is_programmer_error() {
                        tracing::error!(code = err.code(), "{err}");
                    } else {
                        tracing::warn!(code = err.code(), "{err}");
                    }
                    *ctx.response() = err.to_response(json_errors);
                    Ok(())
                }
            }
        })
    })
}

/// A stub bearer-token gate: rejects requests missing an `Authorization:
/// Bearer <token>` header matching `expected_token`.
///
/// Real deployments are expected to replace this with their own identity
/// provider integration; it exists so the middleware ABI has a reference
/// implementation of an auth contract, not as a complete auth system.
pub fn auth(expected_token: impl Into<String>) -> MiddlewareFn {
    let expected = expected_token.into();
    Arc::new(move |ctx: &mut Context<'_>, next: Next<'_>| {
        let expected = expected.clone();
        Box::pin(async move {
            let presented = ctx
                .request()
                .header("authorization")
                .and_then(|value| value.strip_prefix("Bearer "));

            if presented != Some(expected.as_str()) {
                ctx.text(StatusCode::Unauthorized, b"unauthorized".to_vec());
                return Ok(());
            }

            next.run(ctx).await
        })
    })
}

/// Shared state for [`rate_limit`]: a fixed-window counter per remote IP.
struct RateLimiterState {
    windows: Mutex<HashMap<String, (Instant, usize)>>,
    sequence: AtomicU64,
}

/// A fixed-window rate limiter keyed by the `X-Forwarded-For` header (or
/// `"unknown"` if absent, since this middleware has no direct access to
/// the peer address — the engine is expected to set that header from the
/// accepted socket before dispatch).
///
/// Limits to [`MAX_REQUESTS_PER_IP_PER_MINUTE`] requests per
/// [`RATE_LIMIT_WINDOW`]; the window resets the first time it's found
/// expired rather than on a fixed wall-clock boundary.
pub fn rate_limit() -> MiddlewareFn {
    let state = Arc::new(RateLimiterState {
        windows: Mutex::new(HashMap::new()),
        sequence: AtomicU64::new(0),
    });

    Arc::new(move |ctx: &mut Context<'_>, next: Next<'_>| {
        let state = Arc::clone(&state);
        Box::pin(async move {
            let key = ctx.request().header("x-forwarded-for").unwrap_or("unknown").to_string();
            state.sequence.fetch_add(1, Ordering::Relaxed);

            let limited = {
                let mut windows = state.windows.lock().unwrap();
                let now = Instant::now();
                let entry = windows.entry(key).or_insert((now, 0));

                if now.duration_since(entry.0) > RATE_LIMIT_WINDOW {
                    *entry = (now, 0);
                }
                entry.1 += 1;
                entry.1 > MAX_REQUESTS_PER_IP_PER_MINUTE
            };

            if limited {
                ctx.response().set_header("Retry-After", RATE_LIMIT_WINDOW.as_secs().to_string());
                ctx.text(StatusCode::TooManyRequests, b"rate limit exceeded".to_vec());
                return Ok(());
            }

            next.run(ctx).await
        })
    })
}

/// Assigns each request a monotonically increasing ID, exposed as both
/// an `X-Request-Id` response header and `ctx` state under `"request_id"`.
pub fn request_id() -> MiddlewareFn {
    let counter = Arc::new(AtomicU64::new(1));
    Arc::new(move |ctx: &mut Context<'_>, next: Next<'_>| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            let id = counter.fetch_add(1, Ordering::Relaxed);
            ctx.set_state("request_id", id);

            let result = next.run(ctx).await;
            ctx.response().set_header("X-Request-Id", id.to_string());
            result
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::Context, http::request, router::HandlerFn};
    use std::sync::Arc as StdArc;

    fn ok_handler() -> HandlerFn {
        StdArc::new(|ctx: &mut Context<'_>| {
            Box::pin(async move {
                ctx.text(StatusCode::Ok, b"ok".to_vec());
                Ok(())
            })
        })
    }

    async fn run_through(mw: MiddlewareFn, raw: &'static [u8]) -> Context<'static> {
        let mut ctx = Context::new(request::parse(raw).unwrap());
        let handler = ok_handler();
        let next = Next::new_for_test(&[], &handler);
        mw(&mut ctx, next).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn request_id_sets_header_and_state() {
        let mut ctx = run_through(request_id(), b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(ctx.state::<u64>("request_id").is_some());
        assert!(ctx.response().header("X-Request-Id").is_some());
    }

    #[tokio::test]
    async fn auth_rejects_missing_token() {
        let mut ctx = run_through(auth("secret"), b"GET / HTTP/1.1\r\n\r\n").await;
        assert_eq!(ctx.response().status(), StatusCode::Unauthorized);
    }

    #[tokio::test]
    async fn auth_accepts_matching_bearer_token() {
        let raw = b"GET / HTTP/1.1\r\nAuthorization: Bearer secret\r\n\r\n";
        let mut ctx = run_through(auth("secret"), raw).await;
        let text = String::from_utf8(ctx.response().build()).unwrap();
        assert!(text.ends_with("ok"));
    }

    #[tokio::test]
    async fn cors_answers_preflight_without_reaching_handler() {
        let mut ctx = run_through(cors("https://example.com"), b"OPTIONS /x HTTP/1.1\r\n\r\n").await;
        assert_eq!(ctx.response().status(), StatusCode::NoContent);
        assert_eq!(ctx.response().header("Access-Control-Allow-Origin"), Some("https://example.com"));
    }

    #[tokio::test]
    async fn rate_limit_allows_up_to_the_window_maximum() {
        let mw = rate_limit();
        for _ in 0..MAX_REQUESTS_PER_IP_PER_MINUTE {
            let ctx = run_through(mw.clone(), b"GET / HTTP/1.1\r\nX-Forwarded-For: 1.2.3.4\r\n\r\n").await;
            assert_eq!(ctx.response().status(), StatusCode::Ok);
        }
        let ctx = run_through(mw, b"GET / HTTP/1.1\r\nX-Forwarded-For: 1.2.3.4\r\n\r\n").await;
        assert_eq!(ctx.response().status(), StatusCode::TooManyRequests);
    }

    #[tokio::test]
    async fn error_handler_converts_errors_into_responses() {
        let failing: HandlerFn = StdArc::new(|_ctx: &mut Context<'_>| {
            Box::pin(async move { Err(crate::errors::RouteError::NotFound.into()) })
        });
        let mut ctx = Context::new(request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap());
        let next = Next::new_for_test(&[], &failing);
        let mw = error_handler(false);
        mw(&mut ctx, next).await.unwrap();
        assert_eq!(ctx.response().status(), StatusCode::NotFound);
    }
}
