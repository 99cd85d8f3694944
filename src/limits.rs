//! Web server configuration limits and timeouts
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Memory overflows
//! - Slowloris attacks
//! - Header flooding
//!
//! # Memory Consumption
//!
//! Each active connection consumes memory according to:
//!
//! `Total` = [`Request Buffer`](crate::limits::ReqLimits#memory-allocation-strategy) +
//!           [`Response Buffer`](crate::limits::RespLimits#buffer-management) +
//!           `Runtime Overhead`
//!
//! See each component's documentation for details and configuration options.
//!
//! # Examples
//!
//! ```no_run
//! use anvil_web::{Router, Server, limits::{ConnLimits, ReqLimits, ServerLimits}};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .router(Router::new())
//!         .server_limits(ServerLimits {
//!             max_connections: 20_000, // Higher concurrency
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             header_count: 200,        // More headers for complex APIs
//!             body_size: 64 * 1024 * 1024, // 64MB for larger payloads
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .await
//!         .unwrap()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Hard security bound constants.
///
/// These double as the `Default` values of the tunable limit structs below.
/// Nothing in this module clamps a field to these numbers — a deployment
/// is free to raise or lower them through [`ReqLimits`], [`ServerLimits`],
/// etc. — but a server that never touches the builder runs with exactly
/// these values.
pub mod constants {
    use std::time::Duration;

    /// Maximum total size of a single request: header block plus body.
    pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;
    /// Maximum number of headers accepted on one request.
    pub const MAX_HEADER_COUNT: usize = 100;
    /// Maximum length in bytes of one header name.
    pub const MAX_HEADER_NAME_SIZE: usize = 256;
    /// Maximum length in bytes of one header value.
    pub const MAX_HEADER_VALUE_SIZE: usize = 4 * 1024;
    /// Maximum length in bytes of the request-target (path + query).
    pub const MAX_URI_LENGTH: usize = 2048;
    /// Maximum request body size accepted after Content-Length validation.
    pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
    /// Maximum length in bytes of the method token.
    pub const MAX_METHOD_LENGTH: usize = 16;
    /// Maximum length in bytes of the HTTP-version token.
    pub const MAX_VERSION_LENGTH: usize = 16;
    /// Maximum number of concurrently active connections.
    pub const MAX_CONNECTIONS: usize = 10_000;
    /// Maximum number of `/`-separated segments a router path may have.
    pub const MAX_PATH_DEPTH: usize = 20;
    /// Sliding window used by the rate-limit middleware.
    pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
    /// Requests allowed per remote IP per [`RATE_LIMIT_WINDOW`].
    pub const MAX_REQUESTS_PER_IP_PER_MINUTE: usize = 100;
    /// Maximum size of a configuration file accepted by [`crate::config`]'s loader.
    pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
}

/// Controls server-level concurrency and the buffer pool backing every
/// connection.
///
/// # Admission
///
/// Neither engine queues a connection once accepted: the thread engine
/// spawns one task per connection and the reactor engine drives one state
/// machine per connection on its single event-loop thread, both bounded by
/// the same `max_connections` admission counter. A connection accepted past
/// that ceiling is dropped immediately rather than queued for a free slot
/// or a dedicated 503 handler — see `DESIGN.md` for why the teacher
/// crate's queue-and-`wait_strategy` model was replaced.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum number of concurrent active connections being processed
    /// (default: [`constants::MAX_CONNECTIONS`]).
    pub max_connections: usize,

    /// Maximum number of buffers the connection buffer pool will allocate
    /// (default: [`constants::MAX_CONNECTIONS`]).
    ///
    /// Acquiring a buffer past this ceiling fails with
    /// [`crate::buffer_pool::PoolError::Exhausted`], reported to the client
    /// as `503`, independent of the `max_connections` admission check —
    /// the two bounds are checked at different points in the pipeline.
    pub max_buffers: usize,

    /// Format for error responses (default: `true`)
    ///
    /// # Examples
    /// If `true`, then on error the server will return:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// connection: close\r
    /// content-length: 55\r
    /// content-type: application/json\r
    /// \r
    /// {"error":"Invalid HTTP method","code":"INVALID_METHOD"}
    /// ```
    /// If `false`, then on error the server will return:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// connection: close\r
    /// content-length: 0\r
    /// \r
    /// ```
    pub json_errors: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: constants::MAX_CONNECTIONS,
            max_buffers: constants::MAX_CONNECTIONS,
            json_errors: true,

            _priv: (),
        }
    }
}

/// Connection-level limits and timeouts
///
/// Controls individual TCP connection behavior including timeouts,
/// lifetime, and request limits.
///
/// Default values balance performance, resource usage, and security.
/// Only change if you understand the consequences.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum duration to wait for reading data from socket (default: `2 seconds`)
    ///
    /// If no data is received within this time, connection is closed.
    /// This is the primary mechanism for cleaning up stalled connections.
    /// Prevents `slowloris attacks` and frees resources from inactive clients.
    pub socket_read_timeout: Duration,

    /// Maximum duration to wait for writing data to socket (default: `3 seconds`)
    ///
    /// If data can't be written in time, connection is terminated.
    /// Applies to individual write operations, including each retry of a
    /// partial write.
    pub socket_write_timeout: Duration,

    /// Maximum number of requests allowed per connection (default: `1`)
    ///
    /// Each connection is closed after its one request completes — there is
    /// no persistent keep-alive across multiple requests on one connection.
    /// This field exists so the connection lifecycle code has a single
    /// place to assert that invariant rather than hard-coding it.
    pub max_requests_per_connection: usize,

    /// Maximum lifetime of connection from establishment to closure (default: `30 seconds`)
    ///
    /// Final safety net that guarantees no connection lives longer than this duration.
    /// In practice, connections are typically cleaned up by `socket_read_timeout`
    /// long before this limit is reached.
    pub connection_lifetime: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),
            connection_lifetime: Duration::from_secs(30),
            max_requests_per_connection: 1,

            _priv: (),
        }
    }
}

/// HTTP request parsing limits and buffer pre-allocation strategy
///
/// **SECURITY-FIRST DEFAULTS**
///
/// These limits are intentionally conservative to prevent resource exhaustion
/// and various parsing attacks. They work well for:
/// - Simple REST APIs
/// - Microservices
/// - Internal tools
/// - Low-memory environments
///
/// You MAY need to increase these if you see:
/// - `413 Payload Too Large` for legitimate requests
/// - `414 URI Too Long` for normal API calls
/// - `431 Request Header Fields Too Large`
///
/// # Memory Allocation Strategy
///
/// Each TCP connection pre-allocates a fixed-size buffer, acquired from the
/// [`BufferPool`](crate::buffer_pool::BufferPool), based on these limits:
///
/// ```text
/// Total Buffer = First Line + (Headers x Header Line) + Body + Overhead
/// ```
///
/// # Memory Planning
///
/// # Example
/// ```
/// use anvil_web::limits::ReqLimits;
///
/// let limits = ReqLimits::default();
/// let buffer_size = limits.estimated_buffer_size();
/// println!("Each connection needs {} bytes for data buffer", buffer_size);
/// ```
///
/// # Trade-off Considerations
///
/// - **Small limits**: Less memory, faster parsing, but may reject legitimate requests
/// - **Large limits**: More memory overhead, but handles complex APIs and large payloads
///
/// Adjust based on your specific use case and available resources.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum URL length in bytes including path and query string (default:
    /// [`constants::MAX_URI_LENGTH`])
    ///
    /// Covers the entire URL after the method (e.g., `/api/users/123?sort=name&debug`).
    pub url_size: usize,
    /// Maximum number of path segments in URL (default: [`constants::MAX_PATH_DEPTH`])
    ///
    /// Counts slashes in path (e.g., `/api/users/123` has 3 segments).
    pub url_parts: usize,
    /// Maximum query string length (default: `512`)
    ///
    /// Covers the entire query request, including `?` (e.g., `?sort=name&debug`).
    /// If you don't need this limit, set it to [url_size](Self::url_size).
    pub url_query_size: usize,
    /// Maximum number of query parameters (default: `32`)
    ///
    /// Limits the URL query string to N `key=value` pairs separated by `&` when N > 1.
    /// Prevents query parameter explosion attacks.
    pub url_query_parts: usize,

    /// Maximum number of headers per request (default: [`constants::MAX_HEADER_COUNT`])
    ///
    /// Typical browsers send 10-12 headers; this leaves plenty of room for
    /// custom headers while still preventing header-flooding attacks.
    pub header_count: usize,
    /// Maximum header name length in bytes (default: [`constants::MAX_HEADER_NAME_SIZE`])
    pub header_name_size: usize,
    /// Maximum header value length in bytes (default: [`constants::MAX_HEADER_VALUE_SIZE`])
    ///
    /// Fits most headers including JWT tokens, cookies, and UUIDs.
    pub header_value_size: usize,

    /// Maximum request body size in bytes (default: [`constants::MAX_BODY_SIZE`])
    pub body_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub precalc: ReqLimitsPrecalc,
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            url_size: constants::MAX_URI_LENGTH,
            url_parts: constants::MAX_PATH_DEPTH,
            url_query_size: 512,
            url_query_parts: 32,

            header_count: constants::MAX_HEADER_COUNT,
            header_name_size: constants::MAX_HEADER_NAME_SIZE,
            header_value_size: constants::MAX_HEADER_VALUE_SIZE,

            body_size: constants::MAX_BODY_SIZE,

            precalc: ReqLimitsPrecalc::default(),
        }
    }
}

impl ReqLimits {
    /// Returns the estimated memory buffer size required per connection.
    ///
    /// This calculates the total buffer size needed to parse HTTP requests
    /// based on the current limits. The buffer includes space for:
    /// - HTTP request line
    /// - Headers (name + value for each header)
    /// - Request body
    /// - CRLF terminators
    ///
    /// # Example
    /// ```
    /// use anvil_web::limits::ReqLimits;
    ///
    /// let limits = ReqLimits::default();
    /// let buffer_size = limits.estimated_buffer_size();
    /// println!("Each connection needs {} bytes for data buffer", buffer_size);
    /// ```
    #[inline(always)]
    pub fn estimated_buffer_size(self) -> usize {
        self.precalculate().precalc.buffer
    }

    #[inline(always)]
    pub(crate) fn precalculate(mut self) -> Self {
        self.precalc.first_line = self.first_line();
        self.precalc.h_line = self.h_line();
        self.precalc.buffer = self.buffer();
        self.precalc.req_without_body = self.precalc.buffer.saturating_sub(self.body_size);

        self
    }

    #[inline(always)]
    // First line + Header * N + "\r\n" + Body, saturating rather than
    // panicking/wrapping on a configuration that multiplies out past
    // `usize::MAX` — these fields come from deployment configuration, not
    // wire input, but a server should never crash on an oversized config.
    fn buffer(&self) -> usize {
        self.header_count
            .saturating_mul(self.precalc.h_line)
            .saturating_add(self.precalc.first_line)
            .saturating_add(2)
            .saturating_add(self.body_size)
    }

    #[inline(always)]
    // First line HTTP request:
    // OPTIONS /url/test HTTP/1.1\r\n
    // |-----| |-------| |------|
    //  Method    URl    Version
    //
    // Formula: Method + " " + URl + " " + Version + "\r\n"
    fn first_line(&self) -> usize {
        constants::MAX_METHOD_LENGTH + 2 + self.url_size + constants::MAX_VERSION_LENGTH + 2
    }

    #[inline(always)]
    // Header:
    // Authorization: Sample%20Data\r\n
    // |-----------|  |-----------|
    //     Name           Value
    //
    // Formula: Name + ": " + Value +  "\r\n"
    fn h_line(&self) -> usize {
        self.header_name_size + self.header_value_size + 4
    }
}

#[doc(hidden)]
#[derive(Debug, Clone, Default)]
pub struct ReqLimitsPrecalc {
    pub(crate) buffer: usize,
    pub(crate) first_line: usize,
    pub(crate) req_without_body: usize,
    pub(crate) h_line: usize,
}

/// Configuration for response processing and memory allocation limits.
///
/// Controls how response buffers are allocated and managed to balance
/// memory usage and performance.
///
/// # Buffer Management
///
/// Based on the configured limits, response buffers are managed as follows:
/// ```rust
/// # use anvil_web::limits::RespLimits;
/// # let limits = RespLimits::default();
/// # let mut buffer: Vec<()> = Vec::with_capacity(limits.default_capacity);
/// #
/// // `buffer` is Vec
/// if buffer.capacity() > limits.max_capacity {
///     buffer = Vec::with_capacity(limits.default_capacity);
/// } else {
///     buffer.clear();
/// }
/// ```
///
/// When the server starts, buffers are created with a capacity equal to `default_capacity`.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial buffer capacity allocated for responses (default: `1024 B`)
    pub default_capacity: usize,
    /// Maximum allowed buffer capacity for responses (default: `8192 B`)
    //
    // Note: If the response exceeds `max_capacity * 2`, it may be sent in 1 or more `syscall`
    pub max_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 8 * 1024,

            _priv: (),
        }
    }
}
