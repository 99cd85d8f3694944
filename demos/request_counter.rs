//! Each connection serves exactly one request and is then closed (see
//! `ConnLimits::max_requests_per_connection`), so there is no more
//! per-connection state to carry a counter in. A counter that should span
//! every request the process ever sees instead lives in the handler's
//! closure environment, shared across connections the same way
//! `middleware::rate_limit`'s window map is.
use anvil_web::{Context, Router, Server, ServerError, StatusCode};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

#[tokio::main]
async fn main() {
    let count = Arc::new(AtomicUsize::new(0));

    let mut router = Router::new();
    router.get(
        "/",
        Arc::new(move |ctx: &mut Context<'_>| {
            let count = Arc::clone(&count);
            Box::pin(async move {
                let seen = count.fetch_add(1, Ordering::Relaxed) + 1;
                ctx.json(StatusCode::Ok, format!(r#"{{"count_request":{seen}}}"#).into_bytes());
                Ok::<(), ServerError>(())
            })
        }),
    );

    Server::builder().router(router).build().unwrap().launch().await;
}
