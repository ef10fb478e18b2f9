//! TCP session to a single controller.

use std::net::SocketAddr;
use std::time::Duration;

use futures::FutureExt;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::command::{Command, checksum};
use crate::errors::Error;
use crate::runtime::{self, AsyncTcpStream, TcpStream, TimedOut};

type Result<T> = std::result::Result<T, Error>;

/// TCP port controllers listen on.
pub const DEFAULT_PORT: u16 = 5577;

/// Timing and retry settings for a [`Session`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use magichome_rs::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_read_timeout(Duration::from_millis(250))
///     .with_max_retries(3);
/// assert_eq!(config.max_retries(), 3);
/// assert_eq!(config.retry_delay(), Duration::from_millis(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            port: DEFAULT_PORT,
            connect_timeout: Self::CONNECT_TIMEOUT,
            read_timeout: Self::READ_TIMEOUT,
            max_retries: Self::MAX_RETRIES,
            retry_delay: Self::RETRY_DELAY,
            buffer_size: Self::BUFFER_SIZE,
        }
    }
}

impl SessionConfig {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    const READ_TIMEOUT: Duration = Duration::from_millis(100);
    const MAX_RETRIES: u32 = 10;
    const RETRY_DELAY: Duration = Duration::from_millis(10);
    const BUFFER_SIZE: usize = 256;

    /// Port used when a device is addressed by IP alone.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How long to wait for a reply before re-sending the command.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// How many times a command is re-sent after a read timeout.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Largest reply read in one go.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// Whether a [`Session`] currently holds a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// A connection to one controller.
///
/// The connection is opened on the first send. After a transport error the
/// session is left as is; call [`Session::reconnect`] and re-issue the
/// command. A session serves one request at a time, which `&mut self`
/// enforces.
pub struct Session {
    endpoint: SocketAddr,
    config: SessionConfig,
    stream: Option<TcpStream>,
}

impl Session {
    pub fn new(endpoint: SocketAddr) -> Self {
        Self::with_config(endpoint, SessionConfig::default())
    }

    pub fn with_config(endpoint: SocketAddr, config: SessionConfig) -> Self {
        Session {
            endpoint,
            config,
            stream: None,
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.stream.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// Open the connection if it is not open yet.
    pub async fn connect(&mut self) -> Result<()> {
        self.stream().await.map(|_| ())
    }

    /// Drop the current connection and open a new one to the same endpoint.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        self.connect().await
    }

    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("{}: disconnected", self.endpoint);
        }
    }

    /// Send an encoded command, returning the reply if it expects one.
    pub async fn send_command(&mut self, command: &Command) -> Result<Option<Vec<u8>>> {
        self.send(
            command.payload(),
            command.appends_checksum(),
            command.expects_reply(),
        )
        .await
    }

    /// Send a command that expects a reply, and return the reply.
    pub async fn request(&mut self, command: &Command) -> Result<Vec<u8>> {
        Ok(self
            .send(command.payload(), command.appends_checksum(), true)
            .await?
            .unwrap_or_default())
    }

    /// Send raw bytes.
    ///
    /// With `append_checksum` the 8-bit sum of `payload` is sent after it.
    /// With `await_response` anything already queued on the connection is
    /// discarded first, then the reply is read and returned as received.
    /// A read that times out re-sends the frame, up to
    /// [`SessionConfig::max_retries`] times.
    pub async fn send(
        &mut self,
        payload: &[u8],
        append_checksum: bool,
        await_response: bool,
    ) -> Result<Option<Vec<u8>>> {
        let mut frame = payload.to_vec();
        if append_checksum {
            frame.push(checksum(payload));
        }

        let endpoint = self.endpoint;
        let config = self.config.clone();
        let stream = self.stream().await?;
        let mut buffer = vec![0u8; config.buffer_size];

        if await_response {
            loop {
                runtime::yield_now().await;
                if drain_stale(stream, &mut buffer, endpoint)? == 0 {
                    break;
                }
            }
        }

        let mut retries = 0;
        loop {
            debug!("{endpoint} <- {frame:02x?}");
            stream
                .write_all(&frame)
                .await
                .map_err(|e| Error::socket("send", e))?;

            if !await_response {
                return Ok(None);
            }

            match runtime::timeout(config.read_timeout, stream.read(&mut buffer)).await {
                Ok(Ok(0)) => return Err(Error::ConnectionClosed),
                Ok(Ok(len)) => {
                    debug!("{endpoint} -> {:02x?}", &buffer[..len]);
                    return Ok(Some(buffer[..len].to_vec()));
                }
                Ok(Err(e)) => return Err(Error::socket("receive", e)),
                Err(TimedOut) => {
                    if retries >= config.max_retries {
                        return Err(Error::RetriesExhausted {
                            attempts: retries + 1,
                        });
                    }
                    retries += 1;
                    debug!(
                        "{endpoint}: no reply, retry {retries}/{}",
                        config.max_retries
                    );
                    runtime::sleep(config.retry_delay).await;
                }
            }
        }
    }

    async fn stream(&mut self) -> Result<&mut TcpStream> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => Self::open(self.endpoint, self.config.connect_timeout).await?,
        };
        Ok(self.stream.insert(stream))
    }

    async fn open(endpoint: SocketAddr, connect_timeout: Duration) -> Result<TcpStream> {
        debug!("{endpoint}: connecting");
        runtime::timeout(connect_timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| Error::ConnectTimeout { addr: endpoint })?
            .map_err(|e| Error::socket("connect", e))
    }
}

/// Discard bytes left over from an earlier exchange, e.g. a reply that
/// arrived after its request timed out. Only reads what the runtime already
/// knows is ready, so callers yield first. Returns the number of bytes dropped.
fn drain_stale(stream: &mut TcpStream, buffer: &mut [u8], endpoint: SocketAddr) -> Result<usize> {
    let mut stale = 0;
    while let Some(read) = stream.read(buffer).now_or_never() {
        match read {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(len) => stale += len,
            Err(e) => return Err(Error::socket("drain", e)),
        }
    }
    if stale > 0 {
        debug!("{endpoint}: discarded {stale} stale bytes");
    }
    Ok(stale)
}

#[cfg(all(test, feature = "runtime-tokio"))]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn fast_config() -> SessionConfig {
        SessionConfig::default()
            .with_read_timeout(Duration::from_millis(50))
            .with_retry_delay(Duration::from_millis(1))
    }

    async fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_request_appends_checksum_and_returns_reply() {
        let (listener, addr) = listener().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 4];
            socket.read_exact(&mut frame).await.unwrap();
            tx.send(frame.to_vec()).unwrap();
            socket.write_all(&[0x71, 0x23, 0x94]).await.unwrap();
        });

        let mut session = Session::with_config(addr, fast_config());
        assert_eq!(session.state(), SessionState::Disconnected);

        let reply = session.send(&[0x71, 0x23, 0x0F], true, true).await.unwrap();
        assert_eq!(reply, Some(vec![0x71, 0x23, 0x94]));
        assert_eq!(rx.recv().await.unwrap(), vec![0x71, 0x23, 0x0F, 0xA3]);
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_send_without_reply() {
        let (listener, addr) = listener().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 3];
            socket.read_exact(&mut frame).await.unwrap();
            tx.send(frame.to_vec()).unwrap();
        });

        let mut session = Session::with_config(addr, fast_config());
        let command = Command::new(vec![0xEF, 0x01, 0x77], false, false);
        assert_eq!(session.send_command(&command).await.unwrap(), None);
        assert_eq!(rx.recv().await.unwrap(), vec![0xEF, 0x01, 0x77]);
    }

    #[tokio::test]
    async fn test_read_timeout_resends_frame() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 4];
            for _ in 0..3 {
                socket.read_exact(&mut frame).await.unwrap();
            }
            socket.write_all(b"late").await.unwrap();
        });

        let mut session = Session::with_config(addr, fast_config());
        let reply = session.send(&[1, 2, 3], true, true).await.unwrap();
        assert_eq!(reply, Some(b"late".to_vec()));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut sink = Vec::new();
            let _ = socket.read_to_end(&mut sink).await;
        });

        let mut session = Session::with_config(
            addr,
            fast_config()
                .with_read_timeout(Duration::from_millis(20))
                .with_max_retries(2),
        );
        let err = session.send(&[1, 2, 3], true, true).await.unwrap_err();
        assert_eq!(err, Error::RetriesExhausted { attempts: 3 });
        assert!(err.is_transport());
        // the session keeps its connection until the caller reconnects
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_stale_reply_is_discarded() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 1];

            socket.read_exact(&mut frame).await.unwrap();
            tokio::time::sleep(Duration::from_millis(60)).await;
            socket.write_all(b"stale").await.unwrap();

            socket.read_exact(&mut frame).await.unwrap();
            socket.write_all(b"fresh").await.unwrap();
        });

        let mut session = Session::with_config(
            addr,
            fast_config()
                .with_read_timeout(Duration::from_millis(20))
                .with_max_retries(0),
        );
        let err = session.send(&[1], false, true).await.unwrap_err();
        assert_eq!(err, Error::RetriesExhausted { attempts: 1 });

        tokio::time::sleep(Duration::from_millis(150)).await;
        let reply = session.send(&[2], false, true).await.unwrap();
        assert_eq!(reply, Some(b"fresh".to_vec()));
    }

    #[tokio::test]
    async fn test_stale_reply_queued_while_caller_blocked_is_discarded() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut frame = [0u8; 1];

            socket.read_exact(&mut frame).unwrap();
            std::thread::sleep(Duration::from_millis(60));
            socket.write_all(b"stale").unwrap();

            socket.read_exact(&mut frame).unwrap();
            socket.write_all(b"fresh").unwrap();
        });

        let mut session = Session::with_config(
            addr,
            fast_config()
                .with_read_timeout(Duration::from_millis(20))
                .with_max_retries(0),
        );
        let err = session.send(&[1], false, true).await.unwrap_err();
        assert_eq!(err, Error::RetriesExhausted { attempts: 1 });

        // Block the runtime thread so the late reply is queued without the
        // reactor seeing it.
        std::thread::sleep(Duration::from_millis(150));
        let reply = session.send(&[2], false, true).await.unwrap();
        assert_eq!(reply, Some(b"fresh".to_vec()));
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_after_peer_closed() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            let (first, _) = listener.accept().await.unwrap();
            drop(first);

            let (mut second, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 2];
            second.read_exact(&mut frame).await.unwrap();
            second.write_all(&[0xAA]).await.unwrap();
        });

        let mut session = Session::with_config(addr, fast_config());
        session.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = session.send(&[0x01], true, true).await.unwrap_err();
        assert!(err.is_transport(), "unexpected error {err}");

        session.reconnect().await.unwrap();
        let reply = session.send(&[0x01], true, true).await.unwrap();
        assert_eq!(reply, Some(vec![0xAA]));
    }

    #[tokio::test]
    async fn test_connect_refused_is_socket_error() {
        let (listener, addr) = listener().await;
        drop(listener);

        let mut session = Session::with_config(addr, fast_config());
        let err = session.send(&[0x01], true, true).await.unwrap_err();
        assert!(matches!(err, Error::Socket { .. }));
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
