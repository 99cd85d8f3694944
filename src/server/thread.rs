//! Thread engine: one task per accepted connection, standing in for one
//! OS thread per connection (see DESIGN.md for why tokio's task spawn is
//! the right analogue here). Admission is bounded by a single atomic
//! fetch-add against `max_connections`, compensated with a fetch-sub on
//! rejection — never a separate load-then-add, so two accepts racing at
//! the boundary can't both slip through.

use crate::{
    buffer_pool::BufferPool,
    limits::ConnLimits,
    router::Router,
    server::connection,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::net::{TcpListener, TcpStream};

pub(crate) async fn run(
    listener: TcpListener,
    router: Arc<Router>,
    pool: Arc<BufferPool>,
    conn_limits: ConnLimits,
    max_connections: usize,
    json_errors: bool,
) {
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                continue;
            }
        };

        if active.fetch_add(1, Ordering::AcqRel) >= max_connections {
            active.fetch_sub(1, Ordering::AcqRel);
            drop(stream);
            continue;
        }

        tracing::debug!(%peer_addr, "connection accepted");

        let router = Arc::clone(&router);
        let pool = Arc::clone(&pool);
        let conn_limits = conn_limits.clone();
        let active = Arc::clone(&active);

        tokio::task::spawn(async move {
            serve_one(stream, &router, &pool, &conn_limits, json_errors).await;
            active.fetch_sub(1, Ordering::AcqRel);
        });
    }
}

async fn serve_one(
    mut stream: TcpStream,
    router: &Router,
    pool: &BufferPool,
    conn_limits: &ConnLimits,
    json_errors: bool,
) {
    let handle = match pool.acquire() {
        Ok(handle) => handle,
        Err(err) => {
            let response = crate::errors::ServerError::from(err).to_response(json_errors).build();
            let _ = connection::write_all(&mut stream, &response, conn_limits.socket_write_timeout).await;
            return;
        }
    };

    let mut buffer = pool.take(handle);

    match connection::read_once(&mut stream, &mut buffer, conn_limits.socket_read_timeout).await {
        Ok(0) => {}
        Ok(_) => {
            let response_bytes = connection::handle_once(&buffer, router, json_errors).await;
            if let Err(err) =
                connection::write_all(&mut stream, &response_bytes, conn_limits.socket_write_timeout).await
            {
                tracing::warn!(%err, "write failed");
            }
        }
        Err(err) => tracing::warn!(%err, "read failed"),
    }

    pool.put_back(handle, buffer);
    if let Err(err) = pool.release(handle) {
        tracing::error!(?err, "failed to release connection buffer back to the pool");
    }
}
