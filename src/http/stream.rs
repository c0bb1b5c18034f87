use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::http::headers::Headers;
use crate::http::response::StatusCode;
use crate::http::writer::{ResponseWriter, WriteError};

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Streams `reader` to the client as a chunked 200 response.
///
/// Any `content-length` in `headers` is dropped. The body is followed by
/// `x-content-sha256` (hex digest) and `x-content-length` trailers covering
/// the bytes sent. A read error ends the body early; the trailers then
/// describe what was actually sent.
pub async fn stream_chunked<W, R>(
    writer: &mut ResponseWriter<W>,
    mut headers: Headers,
    mut reader: R,
    chunk_size: usize,
) -> Result<u64, WriteError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    writer.write_status_line(StatusCode::Ok).await?;

    headers.delete("content-length");
    headers.replace("transfer-encoding", "chunked");
    headers.replace("trailer", "x-content-sha256, x-content-length");
    writer.write_headers(&headers).await?;

    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total: u64 = 0;
    let mut digest = Sha256::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, sent = total, "Stream source failed, ending body");
                break;
            }
        };

        writer.write_chunked_body(&buf[..n]).await?;
        digest.update(&buf[..n]);
        total += n as u64;
    }

    let mut trailers = Headers::new();
    trailers.set("x-content-sha256", &format!("{:x}", digest.finalize()));
    trailers.set("x-content-length", &total.to_string());
    writer.write_chunked_body_done(&trailers).await?;

    Ok(total)
}
