//! WebSocket link to the relay.
//!
//! The connection runs in a dedicated tokio task. The application talks to
//! it through a command channel and receives notifications back, and the
//! task reconnects on its own after the link drops.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Commands sent *into* the transport task.
#[derive(Debug)]
pub enum TransportCommand {
    /// Send one text frame.
    Send(String),
    /// Close the connection and stop reconnecting.
    Close,
}

/// Notifications sent *from* the transport task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportNotification {
    Connected,
    Frame(String),
    Disconnected { reason: Option<String> },
}

enum LinkEnd {
    Lost(Option<String>),
    Shutdown,
}

/// Spawn the transport task for `url`.
///
/// Returns `(command_tx, notification_rx)`.
pub fn spawn_transport(
    url: String,
    reconnect_delay: Duration,
) -> (mpsc::Sender<TransportCommand>, mpsc::Receiver<TransportNotification>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (notif_tx, notif_rx) = mpsc::channel(256);

    tokio::spawn(run_transport(url, reconnect_delay, cmd_rx, notif_tx));

    (cmd_tx, notif_rx)
}

async fn run_transport(
    url: String,
    reconnect_delay: Duration,
    mut cmd_rx: mpsc::Receiver<TransportCommand>,
    notif_tx: mpsc::Sender<TransportNotification>,
) {
    loop {
        let reason = match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                info!(url = %url, "Connected to relay");
                if notif_tx.send(TransportNotification::Connected).await.is_err() {
                    return;
                }
                match pump(ws, &mut cmd_rx, &notif_tx).await {
                    LinkEnd::Shutdown => return,
                    LinkEnd::Lost(reason) => reason,
                }
            }
            Err(e) => Some(e.to_string()),
        };

        warn!(url = %url, reason = ?reason, "Relay connection unavailable");
        if notif_tx
            .send(TransportNotification::Disconnected { reason })
            .await
            .is_err()
        {
            return;
        }

        // Wait before retrying, still honouring Close.
        let retry = tokio::time::sleep(reconnect_delay);
        tokio::pin!(retry);
        loop {
            tokio::select! {
                _ = &mut retry => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(TransportCommand::Send(_)) => {
                        debug!("Dropping outbound frame while disconnected");
                    }
                    Some(TransportCommand::Close) | None => return,
                },
            }
        }
    }
}

async fn pump(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    cmd_rx: &mut mpsc::Receiver<TransportCommand>,
    notif_tx: &mpsc::Sender<TransportNotification>,
) -> LinkEnd {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if notif_tx.send(TransportNotification::Frame(text)).await.is_err() {
                        let _ = write.send(Message::Close(None)).await;
                        return LinkEnd::Shutdown;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return LinkEnd::Lost(None),
                Some(Ok(_)) => {}
                Some(Err(e)) => return LinkEnd::Lost(Some(e.to_string())),
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(TransportCommand::Send(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        return LinkEnd::Lost(Some(e.to_string()));
                    }
                }
                Some(TransportCommand::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    return LinkEnd::Shutdown;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_relay_reports_disconnect() {
        // port 9 (discard) on localhost is closed in test environments
        let (cmd_tx, mut notif_rx) =
            spawn_transport("ws://127.0.0.1:9/ws".into(), Duration::from_millis(10));

        match notif_rx.recv().await {
            Some(TransportNotification::Disconnected { reason }) => assert!(reason.is_some()),
            other => panic!("unexpected notification: {other:?}"),
        }

        cmd_tx.send(TransportCommand::Close).await.unwrap();
        // the task stops and drops its sender
        while notif_rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_wss_url_attempts_tls_handshake() {
        // plain TCP listener: the TLS client hello gets a non-TLS reply
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            while let Ok((mut stream, _)) = listener.accept().await {
                let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            }
        });

        let (cmd_tx, mut notif_rx) =
            spawn_transport(format!("wss://{addr}/ws"), Duration::from_secs(60));

        match notif_rx.recv().await {
            Some(TransportNotification::Disconnected { reason: Some(reason) }) => {
                assert!(
                    !reason.contains("TLS support not compiled in"),
                    "wss:// is unsupported: {reason}"
                );
            }
            other => panic!("unexpected notification: {other:?}"),
        }

        cmd_tx.send(TransportCommand::Close).await.unwrap();
    }
}
