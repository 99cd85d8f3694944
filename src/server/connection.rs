//! The per-connection pipeline shared by both engines: read, parse,
//! dispatch through the router, serialize, write.
//!
//! Grounded in the teacher crate's own `HttpConnection::impl_run` loop and
//! `ConnLimits::write_bytes` — the `select!`-against-`sleep` race for
//! bounding a socket operation by a timeout is kept verbatim; what changes
//! is that a connection now serves exactly one request instead of looping
//! for keep-alive.

use crate::{
    buffer_pool::Buffer,
    context::Context,
    errors::{ParseError, ServerError},
    http::request,
    router::Router,
};
use std::{io, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Outcome of scanning for the header terminator while reading.
pub(crate) enum ReadOutcome {
    /// `CRLFCRLF` was found somewhere in the buffer.
    Complete,
    /// The peer closed before a complete header block arrived.
    PeerClosed,
    /// The buffer filled up with no terminator in sight.
    BufferFull,
}

/// A single bounded read into `buffer`'s full storage, starting at offset
/// zero. Used by the thread engine, which assumes one read carries the
/// whole request (§4.5) rather than looping to fill the buffer.
pub(crate) async fn read_once<S>(
    stream: &mut S,
    buffer: &mut Buffer,
    read_timeout: Duration,
) -> Result<usize, io::Error>
where
    S: AsyncRead + Unpin,
{
    let bytes_read = with_timeout(read_timeout, stream.read(buffer.storage_mut())).await?;
    buffer.set_len(bytes_read);
    Ok(bytes_read)
}

/// Reads repeatedly, appending to `buffer` at its current length, until the
/// header terminator `CRLFCRLF` appears, the peer closes, or the buffer's
/// capacity is exhausted. Used by the reactor engine's `Reading` state.
pub(crate) async fn read_until_header_terminator<S>(
    stream: &mut S,
    buffer: &mut Buffer,
    read_timeout: Duration,
) -> Result<ReadOutcome, io::Error>
where
    S: AsyncRead + Unpin,
{
    loop {
        if memchr::memmem::find(buffer.filled(), b"\r\n\r\n").is_some() {
            return Ok(ReadOutcome::Complete);
        }
        if buffer.len() == buffer.capacity() {
            return Ok(ReadOutcome::BufferFull);
        }

        let offset = buffer.len();
        let bytes_read = {
            let target = &mut buffer.storage_mut()[offset..];
            with_timeout(read_timeout, stream.read(target)).await?
        };
        if bytes_read == 0 {
            return Ok(ReadOutcome::PeerClosed);
        }
        buffer.set_len(offset + bytes_read);
    }
}

/// Parses the request sitting in `buffer` and runs it through `router`,
/// returning the serialized response bytes. Parse and route failures never
/// propagate past this call — they're turned into an error response here,
/// same as a middleware-level `error_handler` would for a handler failure
/// that isn't caught further up the chain.
pub(crate) async fn handle_once(buffer: &Buffer, router: &Router, json_errors: bool) -> Vec<u8> {
    let response = match request::parse(buffer.filled()) {
        Ok(request) => {
            let mut ctx = Context::new(request);
            match router.dispatch(&mut ctx).await {
                Ok(()) => ctx.into_response(),
                Err(err) => {
                    tracing::warn!(code = err.code(), "{err}");
                    err.to_response(json_errors)
                }
            }
        }
        Err(err) => ServerError::from(err).to_response(json_errors),
    };
    response.build()
}

/// The response for a request whose header block never arrived because the
/// read buffer filled up first (reactor `Reading` → `BufferFull`).
pub(crate) fn too_large_response(json_errors: bool) -> Vec<u8> {
    ServerError::from(ParseError::RequestTooLarge)
        .to_response(json_errors)
        .build()
}

/// Writes `bytes` in full, bounded by `write_timeout`. `AsyncWriteExt::write_all`
/// already loops internally until every byte is accepted or an error occurs,
/// satisfying the "loop until all bytes are transmitted" requirement.
pub(crate) async fn write_all<S>(
    stream: &mut S,
    bytes: &[u8],
    write_timeout: Duration,
) -> Result<(), io::Error>
where
    S: AsyncWrite + Unpin,
{
    with_timeout(write_timeout, stream.write_all(bytes)).await
}

async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, io::Error>
where
    F: std::future::Future<Output = Result<T, io::Error>>,
{
    tokio::select! {
        biased;

        result = future => result,
        _ = tokio::time::sleep(duration) => {
            Err(io::Error::new(io::ErrorKind::TimedOut, "socket operation timed out"))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{http::types::StatusCode, router::HandlerFn};
    use std::sync::Arc;
    use tokio::io::duplex;

    fn ok_handler() -> HandlerFn {
        Arc::new(|ctx: &mut Context<'_>| {
            Box::pin(async move {
                ctx.text(StatusCode::Ok, b"hi".to_vec());
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn read_once_captures_a_full_request() {
        let (mut client, mut server) = duplex(256);
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        drop(client);

        let mut buffer = test_buffer(256);
        let n = read_once(&mut server, &mut buffer, Duration::from_secs(1)).await.unwrap();
        assert!(n > 0);
        assert!(buffer.filled().starts_with(b"GET / HTTP/1.1"));
    }

    #[tokio::test]
    async fn handle_once_dispatches_and_serializes() {
        let mut router = Router::new();
        router.get("/", ok_handler());

        let mut buffer = test_buffer(256);
        let req = b"GET / HTTP/1.1\r\n\r\n";
        buffer.storage_mut()[..req.len()].copy_from_slice(req);
        buffer.set_len(req.len());

        let bytes = handle_once(&buffer, &router, false).await;
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK"));
        assert!(text.ends_with("hi"));
    }

    #[tokio::test]
    async fn read_until_header_terminator_waits_for_crlfcrlf() {
        let (mut client, mut server) = duplex(256);
        let mut buffer = test_buffer(256);

        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        let reader = tokio::spawn(async move {
            read_until_header_terminator(&mut server, &mut buffer, Duration::from_secs(1))
                .await
                .map(|_| buffer)
        });

        tokio::task::yield_now().await;
        client.write_all(b"Host: x\r\n\r\n").await.unwrap();

        let buffer = reader.await.unwrap().unwrap();
        assert!(memchr::memmem::find(buffer.filled(), b"\r\n\r\n").is_some());
    }

    #[tokio::test]
    async fn read_until_header_terminator_reports_buffer_full() {
        let (mut client, mut server) = duplex(8);
        client.write_all(b"GETGETGE").await.unwrap();

        let mut buffer = test_buffer(8);
        let outcome = read_until_header_terminator(&mut server, &mut buffer, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(matches!(outcome, ReadOutcome::BufferFull));
    }

    fn test_buffer(capacity: usize) -> Buffer {
        let pool = crate::buffer_pool::BufferPool::new(capacity, 1);
        let handle = pool.acquire().unwrap();
        pool.take(handle)
    }
}
