//! Stream transports: plain TCP, TLS, and WebSocket.
//!
//! Every transport yields the same two halves after connecting: a
//! reader producing decoded [`RelayMessage`]s and a writer consuming
//! pre-rendered command lines. The relay's binary framing rides
//! unchanged inside WebSocket binary frames; outgoing commands go out
//! as text frames.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::codec::{Decoder, Framed};
use tracing::{debug, warn};
use weerelay_proto::{RelayCodec, RelayMessage};

use crate::config::{ConnectionType, RelayConfig};
use crate::error::RelayError;

type TcpFramed = Framed<TcpStream, RelayCodec>;
type TlsFramed = Framed<TlsStream<TcpStream>, RelayCodec>;
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection-layer failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Socket or TLS I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup failure (bad server name, no usable roots).
    #[error("tls error: {0}")]
    Tls(String),

    /// WebSocket handshake or framing failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connect or handshake did not finish in time.
    #[error("connect timed out after {0}s")]
    ConnectTimeout(u64),
}

/// Reading half of a connected transport.
pub struct TransportReader(ReaderInner);

enum ReaderInner {
    Tcp(SplitStream<TcpFramed>),
    Tls(SplitStream<TlsFramed>),
    Ws {
        stream: SplitStream<WsStream>,
        codec: RelayCodec,
        buf: BytesMut,
    },
}

impl std::fmt::Debug for TransportReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self.0 {
            ReaderInner::Tcp(_) => "TransportReader(Tcp)",
            ReaderInner::Tls(_) => "TransportReader(Tls)",
            ReaderInner::Ws { .. } => "TransportReader(Ws)",
        })
    }
}

/// Writing half of a connected transport.
pub struct TransportWriter(WriterInner);

impl std::fmt::Debug for TransportWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self.0 {
            WriterInner::Tcp(_) => "TransportWriter(Tcp)",
            WriterInner::Tls(_) => "TransportWriter(Tls)",
            WriterInner::Ws(_) => "TransportWriter(Ws)",
        })
    }
}

enum WriterInner {
    Tcp(SplitSink<TcpFramed, String>),
    Tls(SplitSink<TlsFramed, String>),
    Ws(SplitSink<WsStream, WsMessage>),
}

impl TransportReader {
    /// The next decoded message, or `None` on clean end of stream.
    pub async fn next_message(&mut self) -> Result<Option<RelayMessage>, RelayError> {
        match &mut self.0 {
            ReaderInner::Tcp(stream) => match stream.next().await {
                Some(result) => Ok(Some(result?)),
                None => Ok(None),
            },
            ReaderInner::Tls(stream) => match stream.next().await {
                Some(result) => Ok(Some(result?)),
                None => Ok(None),
            },
            ReaderInner::Ws { stream, codec, buf } => loop {
                if let Some(msg) = codec.decode(buf)? {
                    return Ok(Some(msg));
                }
                match stream.next().await {
                    Some(Ok(WsMessage::Binary(data))) => buf.extend_from_slice(&data),
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                    Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                    Some(Ok(other)) => {
                        debug!(frame = ?other, "ignoring non-binary websocket frame");
                    }
                    Some(Err(e)) => return Err(TransportError::from(e).into()),
                }
            },
        }
    }
}

impl TransportWriter {
    /// Write one rendered line (or batch of lines) in full.
    pub async fn send_line(&mut self, line: String) -> Result<(), RelayError> {
        match &mut self.0 {
            WriterInner::Tcp(sink) => sink.send(line).await?,
            WriterInner::Tls(sink) => sink.send(line).await?,
            WriterInner::Ws(sink) => sink
                .send(WsMessage::Text(line))
                .await
                .map_err(TransportError::from)?,
        }
        Ok(())
    }

    /// Flush and close the transport.
    pub async fn shutdown(&mut self) -> Result<(), RelayError> {
        match &mut self.0 {
            WriterInner::Tcp(sink) => sink.close().await?,
            WriterInner::Tls(sink) => sink.close().await?,
            WriterInner::Ws(sink) => sink.close().await.map_err(TransportError::from)?,
        }
        Ok(())
    }
}

/// Connect to the relay as configured, with the configured timeout
/// covering TCP connect plus any TLS/WebSocket handshake.
pub async fn connect(
    config: &RelayConfig,
) -> Result<(TransportReader, TransportWriter), RelayError> {
    let deadline = Duration::from_secs(config.connect_timeout_secs);
    timeout(deadline, connect_inner(config))
        .await
        .map_err(|_| TransportError::ConnectTimeout(config.connect_timeout_secs))?
}

async fn connect_inner(
    config: &RelayConfig,
) -> Result<(TransportReader, TransportWriter), RelayError> {
    match config.connection_type {
        ConnectionType::Plain => {
            let tcp = tcp_connect(config).await?;
            let (sink, stream) = Framed::new(tcp, RelayCodec::new()).split();
            Ok((
                TransportReader(ReaderInner::Tcp(stream)),
                TransportWriter(WriterInner::Tcp(sink)),
            ))
        }
        ConnectionType::Tls => {
            let tcp = tcp_connect(config).await?;
            let connector = tls_connector()?;
            let server_name = ServerName::try_from(config.host.clone())
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            let tls = connector
                .connect(server_name, tcp)
                .await
                .map_err(TransportError::Io)?;
            debug!(host = %config.host, "tls handshake complete");
            let (sink, stream) = Framed::new(tls, RelayCodec::new()).split();
            Ok((
                TransportReader(ReaderInner::Tls(stream)),
                TransportWriter(WriterInner::Tls(sink)),
            ))
        }
        ConnectionType::WebSocket | ConnectionType::WebSocketTls => {
            let scheme = if config.connection_type.is_tls() {
                "wss"
            } else {
                "ws"
            };
            let url = format!(
                "{scheme}://{}:{}{}",
                config.host, config.port, config.websocket_path
            );
            let (ws, response) = connect_async(url.as_str())
                .await
                .map_err(TransportError::WebSocket)?;
            debug!(url = %url, status = %response.status(), "websocket connected");
            let (sink, stream) = ws.split();
            Ok((
                TransportReader(ReaderInner::Ws {
                    stream,
                    codec: RelayCodec::new(),
                    buf: BytesMut::new(),
                }),
                TransportWriter(WriterInner::Ws(sink)),
            ))
        }
    }
}

async fn tcp_connect(config: &RelayConfig) -> Result<TcpStream, TransportError> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
    tcp.set_nodelay(true)?;
    Ok(tcp)
}

/// A TLS connector trusting the system's native root certificates.
fn tls_connector() -> Result<TlsConnector, TransportError> {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for error in &certs.errors {
        warn!(error = %error, "error loading a native root certificate");
    }
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!(error = %e, "skipping unusable root certificate");
        }
    }
    if roots.is_empty() {
        return Err(TransportError::Tls(
            "no usable native root certificates".into(),
        ));
    }

    let client = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(client)))
}
