//! Newline-delimited JSON-RPC over a byte stream.
//!
//! Invariants: every output line is exactly one serialized response followed
//! by `\n`; a malformed input line yields at most one error response and
//! never ends the loop; end of input ends the loop with `Ok(())`.

use crate::server::McpServer;
use crate::types::{McpError, McpResponse};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Serializes responses onto a shared output stream.
///
/// Each response is encoded before the lock is taken and then written and
/// flushed while holding it, so concurrent producers cannot interleave
/// partial lines.
pub struct ResponseWriter<W> {
    inner: Mutex<W>,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap an output stream.
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Write one response line.
    pub async fn write(&self, response: &McpResponse) -> io::Result<()> {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');

        let mut out = self.inner.lock().await;
        out.write_all(&line).await?;
        out.flush().await
    }

    /// Recover the output stream.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

/// Run the read loop until end of input.
///
/// Requests are handled one at a time, so responses leave in the order the
/// requests arrived.
pub async fn serve<R, W>(server: &McpServer, reader: R, writer: &ResponseWriter<W>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut reader = reader;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).await?;
        if read == 0 {
            debug!("Input closed");
            return Ok(());
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => server.handle_line(line).await,
            Err(e) => Some(McpResponse::error(
                None,
                McpError::parse_error().with_data(format!("invalid UTF-8: {}", e)),
            )),
        };

        if let Some(response) = response {
            writer.write(&response).await?;
        }
    }
}

/// Serve on the process's stdin and stdout.
pub async fn serve_stdio(server: &McpServer) -> io::Result<()> {
    info!(
        name = %server.info().name,
        version = %server.info().version,
        tools = server.registry().len(),
        "Serving MCP over stdio"
    );

    let reader = BufReader::new(tokio::io::stdin());
    let writer = ResponseWriter::new(tokio::io::stdout());
    serve(server, reader, &writer).await
}
