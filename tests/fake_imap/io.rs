//! Socket writes for the fake server.
//!
//! Every write is flushed so the client under test sees each response
//! line as soon as a handler produces it.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Send raw bytes and flush.
pub async fn write_bytes<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    data: &[u8],
) -> std::io::Result<()> {
    let socket = stream.get_mut();
    socket.write_all(data).await?;
    socket.flush().await
}

/// Send one response line. `line` carries its own CRLF.
pub async fn write_line<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    line: &str,
) -> std::io::Result<()> {
    write_bytes(stream, line.as_bytes()).await
}

/// Send `content` as an IMAP literal: `{len}` CRLF, then the bytes.
pub async fn write_literal<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    content: &[u8],
) -> std::io::Result<()> {
    write_line(stream, &format!("{{{}}}\r\n", content.len())).await?;
    write_bytes(stream, content).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_is_length_prefixed() {
        let (client, server) = tokio::io::duplex(256);
        let mut stream = BufReader::new(server);

        write_literal(&mut stream, b"hello").await.unwrap();
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        assert_eq!(buf, b"{5}\r\nhello");
    }
}
