//! The [`Server`] entry point: binds a listener, owns the [`Router`] and
//! buffer pool, and hands connections off to whichever engine the
//! configuration selects.
//!
//! Grounded in the teacher crate's own `ServerBuilder<H, S, F>` — same
//! builder shape (accumulate optional fields, validate at `build()`), same
//! split between a synchronous `build()` and an async `launch()` that never
//! returns. What changes is the payload: the teacher's builder collected a
//! `Handler` impl plus four limit structs feeding a queue-and-worker-pool
//! loop; this one collects a [`Router`] plus the same limit structs feeding
//! direct dispatch to [`thread`] or [`reactor`].

use crate::{
    config::{EngineKind, ServerConfig},
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits},
    router::Router,
    server::{reactor, thread},
};
use std::{io, net::SocketAddr, rc::Rc, sync::Arc};
use tokio::net::TcpListener;

/// Accumulates the pieces a [`Server`] needs before it can bind and run.
///
/// Every field has a default, so `Server::builder().build()` succeeds on
/// its own: it binds `127.0.0.1:8080` and serves an empty [`Router`] (every
/// request gets a 404).
pub struct ServerBuilder {
    router: Router,
    listener: Option<TcpListener>,
    config: ServerConfig,
    server_limits: ServerLimits,
    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            router: Router::new(),
            listener: None,
            config: ServerConfig::default(),
            server_limits: ServerLimits::default(),
            conn_limits: ConnLimits::default(),
            req_limits: ReqLimits::default(),
            resp_limits: RespLimits::default(),
        }
    }
}

impl ServerBuilder {
    /// Sets the router dispatched to on every request. Defaults to an
    /// empty [`Router`] if never called.
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Supplies an already-bound listener, bypassing [`ServerConfig::bind_addr`]
    /// and the `SO_REUSEADDR` socket this builder would otherwise create —
    /// useful for tests that want an ephemeral port (bind to `:0` directly)
    /// or a supervisor process that passes down an inherited socket.
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the deployment configuration (bind address, engine, environment,
    /// log level). Ignored for the bind address if [`Self::listener`] was
    /// also called.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = limits;
        self
    }

    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.conn_limits = limits;
        self
    }

    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.req_limits = limits;
        self
    }

    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.resp_limits = limits;
        self
    }

    /// Binds the listener (if one wasn't supplied via [`Self::listener`])
    /// and produces a [`Server`] ready for [`Server::launch`].
    ///
    /// The listener this builds sets `SO_REUSEADDR` before binding, so a
    /// restarted process can rebind the same address immediately instead of
    /// waiting out `TIME_WAIT` — done through `socket2` since
    /// `tokio::net::TcpListener::bind` has no way to set socket options
    /// before the bind call.
    pub fn build(self) -> io::Result<Server> {
        let listener = match self.listener {
            Some(listener) => listener,
            None => bind_reuseaddr(self.config.bind_addr)?,
        };

        Ok(Server {
            listener,
            router: self.router,
            config: self.config,
            server_limits: self.server_limits,
            conn_limits: self.conn_limits,
            req_limits: self.req_limits,
            resp_limits: self.resp_limits,
        })
    }
}

fn bind_reuseaddr(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = socket2::Domain::for_address(addr);
    let socket = socket2::Socket::new(domain, socket2::Type::STREAM, Some(socket2::Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    TcpListener::from_std(socket.into())
}

/// A bound HTTP/1.1 server, ready to [`launch`](Self::launch).
///
/// Owns exactly what both engines need and nothing they don't: the
/// listener, the router, and the limit structs that size the buffer pool
/// and bound every connection's I/O. The buffer pool itself is created
/// inside [`launch`](Self::launch), sized from `server_limits` and
/// `req_limits`, not stored here — its ownership differs by engine (shared
/// via `Arc` for the thread engine, via `Rc` for the single-threaded
/// reactor), so constructing it earlier would force one or the other.
pub struct Server {
    listener: TcpListener,
    router: Router,
    config: ServerConfig,
    server_limits: ServerLimits,
    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// The address the listener is actually bound to (useful for tests
    /// that bind to `:0` and need the OS-assigned port).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the server to completion. Never returns under normal operation:
    /// the thread engine loops accepting connections on the caller's
    /// runtime, and the reactor engine does the same on a dedicated thread
    /// of its own, with this call blocking (via `spawn_blocking`) until
    /// that thread's loop exits.
    pub async fn launch(self) {
        let buffer_size = self.resp_limits.default_capacity.max(self.req_limits.estimated_buffer_size());
        let max_connections = self.server_limits.max_connections;
        let max_buffers = self.server_limits.max_buffers;
        let json_errors = self.server_limits.json_errors;
        let conn_limits = self.conn_limits;

        tracing::info!(
            addr = %self.listener.local_addr().ok().map(|a| a.to_string()).unwrap_or_default(),
            engine = ?self.config.engine,
            max_connections,
            "server launching",
        );

        match self.config.engine {
            EngineKind::Thread => {
                let pool = Arc::new(crate::buffer_pool::BufferPool::new(buffer_size, max_buffers));
                let router = Arc::new(self.router);
                thread::run(self.listener, router, pool, conn_limits, max_connections, json_errors).await;
            }
            EngineKind::Reactor => {
                run_reactor_on_dedicated_thread(
                    self.listener,
                    self.router,
                    buffer_size,
                    max_buffers,
                    conn_limits,
                    max_connections,
                    json_errors,
                )
                .await;
            }
        }
    }
}

/// Moves the listener, router, and pool onto a dedicated blocking-pool
/// thread with its own single-threaded runtime, so the reactor engine's
/// "everything on one OS thread" invariant holds even when `launch` itself
/// is called from a multi-threaded runtime.
///
/// A `tokio::net::TcpListener` is tied to the I/O driver of the runtime
/// that created it; handing one across threads to a different runtime
/// panics on first use. Converting to `std::net::TcpListener` first and
/// re-registering it with `TcpListener::from_std` inside the new runtime
/// avoids that.
async fn run_reactor_on_dedicated_thread(
    listener: TcpListener,
    router: Router,
    buffer_size: usize,
    max_buffers: usize,
    conn_limits: ConnLimits,
    max_connections: usize,
    json_errors: bool,
) {
    let std_listener = match listener.into_std() {
        Ok(std_listener) => std_listener,
        Err(err) => {
            tracing::error!(%err, "failed to hand listener off to the reactor thread");
            return;
        }
    };
    if let Err(err) = std_listener.set_nonblocking(true) {
        tracing::error!(%err, "failed to set listener nonblocking for the reactor thread");
        return;
    }

    let outcome = tokio::task::spawn_blocking(move || {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        runtime.block_on(async move {
            let listener = TcpListener::from_std(std_listener)?;
            let pool = Rc::new(crate::buffer_pool::BufferPool::new(buffer_size, max_buffers));
            let router = Rc::new(router);
            reactor::run(listener, router, pool, conn_limits, max_connections, json_errors).await;
            io::Result::Ok(())
        })
    })
    .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(%err, "reactor engine exited with an error"),
        Err(err) => tracing::error!(%err, "reactor engine thread panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::Context, http::types::StatusCode, router::HandlerFn};
    use std::sync::Arc as StdArc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn ok_handler() -> HandlerFn {
        StdArc::new(|ctx: &mut Context<'_>| {
            Box::pin(async move {
                ctx.text(StatusCode::Ok, b"hello from anvil".to_vec());
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn builder_defaults_produce_a_bindable_server() {
        let mut config = ServerConfig::default();
        config.bind_addr = "127.0.0.1:0".parse().unwrap();

        let server = Server::builder().config(config).build().unwrap();
        assert!(server.local_addr().is_ok());
    }

    #[tokio::test]
    async fn thread_engine_serves_a_request_end_to_end() {
        let mut router = Router::new();
        router.get("/", ok_handler());

        let mut config = ServerConfig::default();
        config.bind_addr = "127.0.0.1:0".parse().unwrap();
        config.engine = EngineKind::Thread;

        let server = Server::builder().router(router).config(config).build().unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.launch());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();

        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK"));
        assert!(text.ends_with("hello from anvil"));
    }

    #[tokio::test]
    async fn reactor_engine_serves_a_request_end_to_end() {
        let mut router = Router::new();
        router.get("/", ok_handler());

        let mut config = ServerConfig::default();
        config.bind_addr = "127.0.0.1:0".parse().unwrap();
        config.engine = EngineKind::Reactor;

        let server = Server::builder().router(router).config(config).build().unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.launch());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();

        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK"));
        assert!(text.ends_with("hello from anvil"));
    }
}
