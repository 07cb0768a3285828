use bytes::Bytes;
use irisllm::streaming::StreamSession;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::GatewayError;

/// Pumps upstream SSE lines through `session` and writes the converted
/// stream to `writer`, returning the writer once the stream has ended
pub async fn relay_stream<R, W>(
    mut session: StreamSession,
    reader: R,
    writer: W,
) -> Result<W, GatewayError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    // channel to decouple reading upstream from writing downstream
    let (tx, rx) = mpsc::channel::<Bytes>(16);

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        let mut chunks = ReceiverStream::new(rx);
        while let Some(chunk) = chunks.next().await {
            writer.write_all(&chunk).await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(writer)
    });

    info!("relaying {:?} stream", session.conversion());
    let mut reader = reader;
    let mut buf = Vec::new();
    let mut receiver_dropped = false;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                warn!("upstream read failed, closing stream: {}", err);
                break;
            }
        }
        let Some(line) = decode_line(&buf) else {
            warn!("skipping upstream line that is not valid UTF-8 ({} bytes)", buf.len());
            continue;
        };
        if !send_all(&tx, session.push_line(line)).await {
            receiver_dropped = true;
            break;
        }
        if session.is_ended() {
            debug!("stream ended before upstream EOF");
            break;
        }
    }
    if !receiver_dropped {
        send_all(&tx, session.finish()).await;
    }
    drop(tx);

    let writer = writer_task.await.map_err(std::io::Error::other)??;
    Ok(writer)
}

/// Line text without its terminator; `None` when it is not UTF-8
fn decode_line(buf: &[u8]) -> Option<&str> {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    std::str::from_utf8(line).ok()
}

async fn send_all(tx: &mpsc::Sender<Bytes>, fragments: Vec<String>) -> bool {
    for fragment in fragments {
        if tx.send(Bytes::from(fragment)).await.is_err() {
            warn!("Receiver dropped");
            return false;
        }
    }
    true
}
