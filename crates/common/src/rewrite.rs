//! Host header rewriting for proxied HTTP streams
//!
//! The broker forwards the raw bytes of the public request, so the `Host`
//! header still names the public URL. Local servers that route on `Host`
//! (virtual hosts, dev servers with host checks) need to see their own
//! address instead. The rewriter touches only the head of the first request
//! on a stream; everything after the blank line is copied byte for byte.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::MAX_HEADER_LINE_BYTES;
use crate::{Result, TunnelError};

/// Replaces the `Host` header of the first request on a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRewriter {
    host: String,
}

impl HostRewriter {
    /// Create a rewriter that sets `Host: <host>`
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Rewrite the request line and headers, stopping after the blank line
    /// that ends the head (or at end of stream).
    ///
    /// Returns the request line as read. Fails with
    /// [`TunnelError::MalformedStream`] without writing anything when the
    /// stream ends before a request line.
    pub async fn rewrite_head<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = Vec::new();

        if !read_line(reader, &mut line).await? {
            return Err(TunnelError::MalformedStream);
        }
        let request_line = String::from_utf8_lossy(&line).into_owned();

        let mut head = Vec::with_capacity(512);
        head.extend_from_slice(&line);
        head.extend_from_slice(b"\r\n");

        while read_line(reader, &mut line).await? {
            if line.is_empty() {
                head.extend_from_slice(b"\r\n");
                break;
            }

            if is_host_header(&line) {
                head.extend_from_slice(b"Host: ");
                head.extend_from_slice(self.host.as_bytes());
            } else {
                head.extend_from_slice(&line);
            }
            head.extend_from_slice(b"\r\n");
        }

        writer.write_all(&head).await?;
        writer.flush().await?;

        Ok(request_line)
    }

}

/// Case-insensitive match on the `host:` header name
fn is_host_header(line: &[u8]) -> bool {
    line.len() >= 5 && line[..5].eq_ignore_ascii_case(b"host:")
}

/// Read one line into `buf` without its CRLF or LF terminator.
/// Returns `false` at end of stream.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader)
        .take(MAX_HEADER_LINE_BYTES as u64)
        .read_until(b'\n', buf)
        .await?;

    if read == 0 {
        return Ok(false);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if read == MAX_HEADER_LINE_BYTES && !reader.fill_buf().await?.is_empty() {
        return Err(TunnelError::MalformedStream);
    }

    Ok(true)
}
