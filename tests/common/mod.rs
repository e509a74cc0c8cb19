//! Integration test infrastructure: a scripted relay double.
//!
//! `FakeRelay` binds a loopback listener and hands the test a line-based
//! view of the client's commands plus a frame encoder for replies. Tests
//! script both sides of the conversation explicitly.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use weerelay::proto::{encode_frame, Object, RelayMessage};
use weerelay::{RelayConfig, RelayEvent};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test subscriber honoring `RUST_LOG`. Safe to call from
/// every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A listening fake relay, not yet connected.
pub struct FakeRelay {
    listener: TcpListener,
    port: u16,
}

impl FakeRelay {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback listener");
        let port = listener.local_addr().expect("local addr").port();
        Self { listener, port }
    }

    /// A client config pointing at this relay.
    pub fn config(&self) -> RelayConfig {
        let mut config = RelayConfig::new("127.0.0.1", self.port);
        config.password = "pw".into();
        config
    }

    /// Accept the client connection.
    pub async fn accept(self) -> FakeRelayConn {
        let (stream, _) = timeout(IO_TIMEOUT, self.listener.accept())
            .await
            .expect("accept timed out")
            .expect("accept failed");
        let (read, write) = stream.into_split();
        FakeRelayConn {
            reader: BufReader::new(read),
            writer: write,
        }
    }
}

/// One accepted connection from the client under test.
pub struct FakeRelayConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FakeRelayConn {
    /// The next command line from the client, without the newline.
    pub async fn read_line(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(IO_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("read timed out")
            .expect("read failed");
        assert!(n > 0, "client closed the connection");
        line.trim_end_matches('\n').to_string()
    }

    /// Read lines until one starts with `prefix`, skipping others
    /// (pings, mostly). Returns the matching line.
    pub async fn read_until_prefix(&mut self, prefix: &str) -> String {
        loop {
            let line = self.read_line().await;
            if line.starts_with(prefix) {
                return line;
            }
        }
    }

    /// Send one framed message to the client.
    pub async fn send(&mut self, msg: &RelayMessage) {
        timeout(IO_TIMEOUT, self.writer.write_all(&encode_frame(msg)))
            .await
            .expect("write timed out")
            .expect("write failed");
    }
}

/// Receive the next event, panicking on timeout.
pub async fn next_event(events: &mut mpsc::Receiver<RelayEvent>) -> RelayEvent {
    timeout(IO_TIMEOUT, events.recv())
        .await
        .expect("event timed out")
        .expect("event channel closed")
}

/// A `str` object, for message fixtures.
pub fn str_obj(value: &str) -> Object {
    Object::Str(Some(value.to_string()))
}
