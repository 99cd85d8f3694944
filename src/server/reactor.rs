//! Reactor engine: a single-threaded cooperative event loop driving an
//! explicit per-connection state machine.
//!
//! A tokio current-thread runtime plus `LocalSet` stands in for a raw
//! completion-based reactor: `spawn_local` schedules each connection's
//! state machine onto the same OS thread as the accept loop, so nothing
//! here ever crosses a thread boundary, matching "all handlers run on the
//! event-loop thread" and "no preemption" from the concurrency model.

use crate::{
    buffer_pool::BufferPool,
    limits::ConnLimits,
    router::Router,
    server::connection::{self, ReadOutcome},
};
use std::{
    cell::Cell,
    rc::Rc,
};
use tokio::{net::TcpListener, task::LocalSet};

/// Where a connection's state machine currently stands. `Closing` is
/// terminal: the buffer is returned to the pool and the task ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Reading,
    Processing,
    Writing,
    Closing,
}

/// Runs the reactor loop to completion (it never returns under normal
/// operation). Must be driven from within a `LocalSet` — callers get this
/// for free since [`run`] builds its own.
pub(crate) async fn run(
    listener: TcpListener,
    router: Rc<Router>,
    pool: Rc<BufferPool>,
    conn_limits: ConnLimits,
    max_connections: usize,
    json_errors: bool,
) {
    let local = LocalSet::new();
    let active = Rc::new(Cell::new(0usize));

    local
        .run_until(async move {
            loop {
                let (stream, peer_addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(%err, "accept failed");
                        continue;
                    }
                };

                if active.get() >= max_connections {
                    drop(stream);
                    continue;
                }
                active.set(active.get() + 1);
                tracing::debug!(%peer_addr, "connection accepted");

                let router = Rc::clone(&router);
                let pool = Rc::clone(&pool);
                let conn_limits = conn_limits.clone();
                let active = Rc::clone(&active);

                tokio::task::spawn_local(async move {
                    drive(stream, &router, &pool, &conn_limits, json_errors).await;
                    active.set(active.get() - 1);
                });
            }
        })
        .await;
}

/// Threads one connection through `Reading` → `Processing` → `Writing` →
/// `Closing`, acquiring its buffer up front and releasing it on the way out
/// regardless of which path through the state machine was taken.
async fn drive(
    mut stream: tokio::net::TcpStream,
    router: &Router,
    pool: &BufferPool,
    conn_limits: &ConnLimits,
    json_errors: bool,
) {
    let Ok(handle) = pool.acquire() else {
        return;
    };
    let mut buffer = pool.take(handle);
    let mut response_bytes: Vec<u8> = Vec::new();
    let mut state = ConnectionState::Reading;

    loop {
        state = match state {
            ConnectionState::Reading => {
                match connection::read_until_header_terminator(
                    &mut stream,
                    &mut buffer,
                    conn_limits.socket_read_timeout,
                )
                .await
                {
                    Ok(ReadOutcome::Complete) => ConnectionState::Processing,
                    Ok(ReadOutcome::PeerClosed) => ConnectionState::Closing,
                    Ok(ReadOutcome::BufferFull) => {
                        response_bytes = connection::too_large_response(json_errors);
                        ConnectionState::Writing
                    }
                    Err(err) => {
                        tracing::warn!(%err, "read failed");
                        ConnectionState::Closing
                    }
                }
            }
            ConnectionState::Processing => {
                response_bytes = connection::handle_once(&buffer, router, json_errors).await;
                ConnectionState::Writing
            }
            ConnectionState::Writing => {
                if let Err(err) =
                    connection::write_all(&mut stream, &response_bytes, conn_limits.socket_write_timeout).await
                {
                    tracing::warn!(%err, "write failed");
                }
                ConnectionState::Closing
            }
            ConnectionState::Closing => break,
        };
    }

    pool.put_back(handle, buffer);
    if let Err(err) = pool.release(handle) {
        tracing::error!(?err, "failed to release connection buffer back to the pool");
    }
}
