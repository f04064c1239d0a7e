use log::debug;
use std::io::{Error, ErrorKind, Result as IoResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// Write side of a control connection, tagged with its connection id.
#[derive(Clone)]
pub struct ControlWriter {
    id: Arc<str>,
    local_addr: SocketAddr,
    half: Arc<Mutex<OwnedWriteHalf>>,
}

impl ControlWriter {
    pub fn new(id: &str, local_addr: SocketAddr, half: OwnedWriteHalf) -> Self {
        Self {
            id: Arc::from(id),
            local_addr,
            half: Arc::new(Mutex::new(half)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Local address of the control socket, used to bind passive listeners.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Sends one reply line, CRLF appended.
pub async fn send_reply(writer: &ControlWriter, reply: &str) -> IoResult<()> {
    debug!("{} A: {}", writer.id, reply);
    let line = format!("{}\r\n", reply);
    let mut half = writer.half.lock().await;
    write_fully(&mut *half, line.as_bytes()).await?;
    half.flush().await
}

/// Sends a multi-line reply as one write.
pub async fn send_multiline(writer: &ControlWriter, lines: &[&str]) -> IoResult<()> {
    let mut block = String::new();
    for line in lines {
        debug!("{} A: {}", writer.id, line);
        block.push_str(line);
        block.push_str("\r\n");
    }
    let mut half = writer.half.lock().await;
    write_fully(&mut *half, block.as_bytes()).await?;
    half.flush().await
}

/// Writes the whole buffer, retrying short writes and transient errors.
pub async fn write_fully<W>(stream: &mut W, mut buf: &[u8]) -> IoResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    while !buf.is_empty() {
        match stream.write(buf).await {
            Ok(0) => {
                return Err(Error::new(
                    ErrorKind::WriteZero,
                    "peer stopped accepting data",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                tokio::task::yield_now().await;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Reduces a client path to its final component, the name objects are stored under.
pub fn file_name_arg(arg: &str) -> Option<String> {
    let name = arg
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts at most `chunk` bytes per call and fails every other call with
    /// a transient error.
    struct StutteringWriter {
        written: Vec<u8>,
        chunk: usize,
        calls: usize,
    }

    impl AsyncWrite for StutteringWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<IoResult<usize>> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                let kind = if self.calls % 4 == 1 {
                    ErrorKind::Interrupted
                } else {
                    ErrorKind::WouldBlock
                };
                return Poll::Ready(Err(Error::new(kind, "try again")));
            }
            let n = buf.len().min(self.chunk);
            self.written.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<IoResult<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<IoResult<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_fully_survives_short_writes_and_transient_errors() {
        let mut writer = StutteringWriter {
            written: Vec::new(),
            chunk: 3,
            calls: 0,
        };
        let payload: Vec<u8> = (0..50u8).collect();

        write_fully(&mut writer, &payload).await.unwrap();
        assert_eq!(writer.written, payload);
    }

    #[tokio::test]
    async fn test_write_fully_reports_a_closed_peer() {
        let mut writer = StutteringWriter {
            written: Vec::new(),
            chunk: 0,
            calls: 1,
        };
        let err = write_fully(&mut writer, b"data").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteZero);
    }

    #[test]
    fn test_file_name_arg_keeps_the_last_component() {
        assert_eq!(file_name_arg("report.txt").as_deref(), Some("report.txt"));
        assert_eq!(file_name_arg("dir/report.txt").as_deref(), Some("report.txt"));
        assert_eq!(file_name_arg("/a/b/c.bin ").as_deref(), Some("c.bin"));
        assert_eq!(file_name_arg("C:\\tmp\\x.dat").as_deref(), Some("x.dat"));
        assert_eq!(file_name_arg("dir/"), None);
        assert_eq!(file_name_arg(""), None);
        assert_eq!(file_name_arg(".."), None);
    }
}
