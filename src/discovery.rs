//! Device discovery via UDP broadcast.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::{Stream, StreamExt, stream};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::errors::Error;
use crate::runtime::{self, AsyncUdpSocket, Instant, TimedOut, UdpSocket};
use crate::types::{DeviceFamily, MacAddress};

type Result<T> = std::result::Result<T, Error>;

/// UDP port controllers answer discovery probes on.
pub const DISCOVERY_PORT: u16 = 48899;

/// The datagram that makes controllers identify themselves.
pub const PROBE: &[u8] = b"HF-A11ASSISTHREAD";

/// A controller that answered a discovery probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// IP address of the controller
    pub ip: Ipv4Addr,
    /// MAC address, unique per controller
    pub mac: MacAddress,
    /// Model identifier, e.g. `AK001-ZJ200`
    pub model: String,
}

impl DiscoveredDevice {
    /// Convert this discovered controller into a [`Device`].
    ///
    /// Discovery does not report the family, so the caller supplies it.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let devices = discover_devices(Duration::from_secs(5)).await?;
    /// for found in devices {
    ///     let mut device = found.into_device(DeviceFamily::RgbWarmWhite);
    ///     device.turn_on().await?;
    /// }
    /// ```
    pub fn into_device(self, family: DeviceFamily) -> Device {
        Device::new(self.ip, family)
    }
}

/// Where and for how long to look for controllers.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use magichome_rs::DiscoveryConfig;
///
/// let config = DiscoveryConfig::default().with_timeout(Duration::from_secs(2));
/// assert_eq!(config.timeout(), Duration::from_secs(2));
/// assert_eq!(config.target().port(), 48899);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    target: SocketAddr,
    timeout: Duration,
    recv_timeout: Duration,
    receives_per_probe: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            target: SocketAddr::from((Ipv4Addr::BROADCAST, DISCOVERY_PORT)),
            timeout: Duration::from_secs(5),
            recv_timeout: Duration::from_millis(200),
            receives_per_probe: 10,
        }
    }
}

impl DiscoveryConfig {
    /// Address the probe is sent to. Defaults to the limited broadcast address.
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    /// Total time budget of one enumeration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Replies read after each probe before probing again.
    pub fn with_receives_per_probe(mut self, receives: u32) -> Self {
        self.receives_per_probe = receives.max(1);
        self
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn recv_timeout(&self) -> Duration {
        self.recv_timeout
    }

    pub fn receives_per_probe(&self) -> u32 {
        self.receives_per_probe
    }
}

/// Discover controllers, yielding each one as soon as it answers.
///
/// The probe is re-broadcast whenever a receive times out or
/// `receives_per_probe` replies have been read, until the configured timeout
/// has passed. Each MAC address is yielded once; replies that are not
/// `ip,mac,model` are skipped. Errors binding or probing are returned here;
/// a socket error later on ends the stream.
///
/// # Examples
///
/// ```ignore
/// use futures::StreamExt;
/// use magichome_rs::{DiscoveryConfig, discover};
///
/// let devices = discover(DiscoveryConfig::default()).await?;
/// futures::pin_mut!(devices);
/// while let Some(found) = devices.next().await {
///     println!("{} {} {}", found.ip, found.mac, found.model);
/// }
/// ```
pub async fn discover(
    config: DiscoveryConfig,
) -> Result<impl Stream<Item = DiscoveredDevice> + Send> {
    let started = Instant::now();
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
        .await
        .map_err(|e| Error::socket("bind", e))?;

    socket
        .set_broadcast(true)
        .map_err(|e| Error::socket("set_broadcast", e))?;

    socket
        .send_to(PROBE, config.target)
        .await
        .map_err(|e| Error::socket("send_to", e))?;
    debug!("discovery probe sent to {}", config.target);

    let enumeration = Enumeration {
        socket,
        started,
        receives_left: config.receives_per_probe,
        config,
        seen: HashSet::new(),
        buffer: vec![0u8; 64],
    };
    Ok(stream::unfold(enumeration, Enumeration::advance))
}

/// Discover controllers for `discovery_timeout` and collect them.
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
/// use magichome_rs::discover_devices;
///
/// let devices = discover_devices(Duration::from_secs(5)).await?;
/// println!("Found {} controllers", devices.len());
/// ```
pub async fn discover_devices(discovery_timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
    let config = DiscoveryConfig::default().with_timeout(discovery_timeout);
    Ok(discover(config).await?.collect().await)
}

struct Enumeration {
    socket: UdpSocket,
    config: DiscoveryConfig,
    started: Instant,
    receives_left: u32,
    seen: HashSet<MacAddress>,
    buffer: Vec<u8>,
}

impl Enumeration {
    async fn advance(mut self) -> Option<(DiscoveredDevice, Self)> {
        loop {
            let remaining = self.config.timeout.checked_sub(self.started.elapsed())?;
            if remaining.is_zero() {
                return None;
            }

            if self.receives_left == 0 {
                if let Err(e) = self.socket.send_to(PROBE, self.config.target).await {
                    warn!("discovery stopped, probe failed: {e}");
                    return None;
                }
                self.receives_left = self.config.receives_per_probe;
            }
            self.receives_left -= 1;

            let wait = self.config.recv_timeout.min(remaining);
            match runtime::timeout(wait, self.socket.recv_from(&mut self.buffer)).await {
                Err(TimedOut) => self.receives_left = 0,
                Ok(Err(e)) => {
                    warn!("discovery stopped, receive failed: {e}");
                    return None;
                }
                Ok(Ok((len, from))) => match parse_reply(&self.buffer[..len]) {
                    Some(found) => {
                        if self.seen.insert(found.mac) {
                            debug!("discovered {} at {}", found.mac, found.ip);
                            return Some((found, self));
                        }
                    }
                    None => warn!(
                        "ignoring discovery reply from {from}: {:?}",
                        String::from_utf8_lossy(&self.buffer[..len])
                    ),
                },
            }
        }
    }
}

/// Parse an `ip,mac,model` reply.
fn parse_reply(reply: &[u8]) -> Option<DiscoveredDevice> {
    let text = std::str::from_utf8(reply).ok()?;
    let mut fields = text.trim_end_matches(['\0', '\r', '\n']).split(',');
    let (Some(ip), Some(mac), Some(model), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return None;
    };

    Some(DiscoveredDevice {
        ip: ip.trim().parse().ok()?,
        mac: mac.trim().parse().ok()?,
        model: model.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let found = parse_reply(b"192.168.1.42,ACCF23A1B2C3,AK001-ZJ200").unwrap();
        assert_eq!(found.ip, Ipv4Addr::new(192, 168, 1, 42));
        assert_eq!(found.mac.to_string(), "AC:CF:23:A1:B2:C3");
        assert_eq!(found.model, "AK001-ZJ200");
    }

    #[test]
    fn test_parse_reply_rejects_malformed() {
        assert!(parse_reply(PROBE).is_none());
        assert!(parse_reply(b"192.168.1.42,ACCF23A1B2C3").is_none());
        assert!(parse_reply(b"192.168.1.42,ACCF23A1B2C3,model,extra").is_none());
        assert!(parse_reply(b"192.168.1,ACCF23A1B2C3,model").is_none());
        assert!(parse_reply(b"192.168.1.42,not-a-mac,model").is_none());
        assert!(parse_reply(&[0xFF, 0xFE, b',', b',']).is_none());
    }

    #[cfg(feature = "runtime-tokio")]
    mod live {
        use super::*;
        use std::time::Instant as StdInstant;
        use tokio::net::UdpSocket as TokioUdpSocket;

        async fn responder(replies: Vec<&'static [u8]>) -> SocketAddr {
            let socket = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
            let addr = socket.local_addr().unwrap();
            tokio::spawn(async move {
                let mut buffer = [0u8; 64];
                while let Ok((len, from)) = socket.recv_from(&mut buffer).await {
                    assert_eq!(&buffer[..len], PROBE);
                    for reply in &replies {
                        socket.send_to(reply, from).await.unwrap();
                    }
                }
            });
            addr
        }

        fn config(target: SocketAddr, timeout_ms: u64) -> DiscoveryConfig {
            DiscoveryConfig::default()
                .with_target(target)
                .with_timeout(Duration::from_millis(timeout_ms))
                .with_recv_timeout(Duration::from_millis(50))
        }

        #[tokio::test]
        async fn test_discover_deduplicates_by_mac() {
            let target = responder(vec![
                &b"10.0.0.5,ACCF23A1B2C3,first"[..],
                &b"garbage"[..],
                &b"10.0.0.5,ACCF23A1B2C3,second"[..],
                &b"10.0.0.6,ACCF23A1B2C4,AK001-ZJ200"[..],
            ])
            .await;

            let devices: Vec<_> = discover(config(target, 400)).await.unwrap().collect().await;

            assert_eq!(devices.len(), 2);
            assert_eq!(devices[0].ip, Ipv4Addr::new(10, 0, 0, 5));
            assert_eq!(devices[0].model, "first");
            assert_eq!(devices[1].mac, "ACCF23A1B2C4".parse::<MacAddress>().unwrap());
        }

        #[tokio::test]
        async fn test_discover_ends_at_deadline_without_replies() {
            let target = responder(vec![]).await;

            let started = StdInstant::now();
            let devices: Vec<_> = discover(config(target, 200)).await.unwrap().collect().await;

            assert!(devices.is_empty());
            assert!(started.elapsed() >= Duration::from_millis(150));
            assert!(started.elapsed() < Duration::from_secs(2));
        }

        #[tokio::test]
        async fn test_discover_yields_before_deadline() {
            let target = responder(vec![&b"10.0.0.7,ACCF23A1B2C5,AK001-ZJ200"[..]]).await;

            let started = StdInstant::now();
            let devices = discover(config(target, 5_000)).await.unwrap();
            futures::pin_mut!(devices);
            let first = devices.next().await.unwrap();

            assert_eq!(first.ip, Ipv4Addr::new(10, 0, 0, 7));
            assert!(started.elapsed() < Duration::from_secs(1));
        }
    }
}
