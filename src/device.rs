//! High-level control of one controller.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use chrono::NaiveDateTime;
use futures::StreamExt;
use log::debug;

use crate::codec;
use crate::discovery::{DiscoveryConfig, discover};
use crate::errors::Error;
use crate::session::{Session, SessionConfig};
use crate::status::DeviceStatus;
use crate::timer::{ExpiryFilter, TimerSlot, decode_schedule, encode_schedule};
use crate::types::{ChannelSet, DeviceFamily, MacAddress, PowerState, PresetMode};

type Result<T> = std::result::Result<T, Error>;

/// A Magic Home controller.
///
/// Ties a [`Session`] to the dialect of one [`DeviceFamily`]. The connection
/// is opened by the first command. Commands fail with a transport error when
/// the connection breaks; call [`Device::reconnect`] and retry.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use magichome_rs::{Device, DeviceFamily, SessionState};
///
/// let device = Device::new(Ipv4Addr::new(192, 168, 1, 50), DeviceFamily::RgbWarmWhite);
/// assert_eq!(device.endpoint().port(), 5577);
/// assert_eq!(device.session().state(), SessionState::Disconnected);
/// ```
pub struct Device {
    session: Session,
    family: DeviceFamily,
    keep_expired_timers: bool,
}

impl Device {
    pub fn new(ip: Ipv4Addr, family: DeviceFamily) -> Self {
        Self::with_config(ip, family, SessionConfig::default())
    }

    pub fn with_config(ip: Ipv4Addr, family: DeviceFamily, config: SessionConfig) -> Self {
        let endpoint = SocketAddr::from((ip, config.port()));
        Self::with_endpoint(endpoint, family, config)
    }

    pub fn with_endpoint(endpoint: SocketAddr, family: DeviceFamily, config: SessionConfig) -> Self {
        Device {
            session: Session::with_config(endpoint, config),
            family,
            keep_expired_timers: false,
        }
    }

    /// Keep one-shot timers whose date has passed in [`Device::get_timers`].
    pub fn with_keep_expired_timers(mut self, keep: bool) -> Self {
        self.keep_expired_timers = keep;
        self
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.session.endpoint()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Direct access to the connection, for sending raw commands.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub async fn reconnect(&mut self) -> Result<()> {
        self.session.reconnect().await
    }

    pub async fn get_status(&mut self) -> Result<DeviceStatus> {
        let reply = self
            .session
            .request(&codec::encode_status_query(self.family))
            .await?;
        codec::decode_status(self.family, &reply)
    }

    pub async fn set_power_state(&mut self, state: PowerState) -> Result<()> {
        debug!("{}: power {:?}", self, state);
        self.session
            .send_command(&codec::encode_power(self.family, state))
            .await?;
        Ok(())
    }

    pub async fn turn_on(&mut self) -> Result<()> {
        self.set_power_state(PowerState::PowerOn).await
    }

    pub async fn turn_off(&mut self) -> Result<()> {
        self.set_power_state(PowerState::PowerOff).await
    }

    /// Set the output channels.
    ///
    /// With `persist` the controller restores this color after a power
    /// cycle. Without `wait_for_response` the command is written and not
    /// acknowledged, which suits rapid updates. Channel sets the family
    /// cannot express fail before anything is sent.
    pub async fn set_color(
        &mut self,
        channels: &ChannelSet,
        persist: bool,
        wait_for_response: bool,
    ) -> Result<()> {
        let command = codec::encode_color(self.family, channels, persist, wait_for_response)?;
        self.session.send_command(&command).await?;
        Ok(())
    }

    /// Run a built-in animation. `delay` is clamped to 1 (fastest) - 24.
    pub async fn set_preset(&mut self, mode: PresetMode, delay: u8) -> Result<()> {
        self.session
            .send_command(&codec::encode_preset(self.family, mode, delay))
            .await?;
        Ok(())
    }

    /// Read the controller's clock.
    pub async fn get_time(&mut self) -> Result<NaiveDateTime> {
        let reply = self.session.request(&codec::encode_clock_query()).await?;
        codec::decode_clock(&reply)
    }

    /// Set the controller's clock, which timers fire against.
    pub async fn set_time(&mut self, time: NaiveDateTime) -> Result<()> {
        self.session
            .send_command(&codec::encode_clock_set(time)?)
            .await?;
        Ok(())
    }

    /// Read the timer schedule.
    ///
    /// Unused slots are left out. One-shot timers that have already fired are
    /// left out too, unless [`Device::with_keep_expired_timers`] is set.
    pub async fn get_timers(&mut self) -> Result<Vec<TimerSlot>> {
        let expiry = if self.keep_expired_timers {
            ExpiryFilter::Disabled
        } else {
            ExpiryFilter::now_local()
        };
        self.get_timers_with(expiry).await
    }

    pub async fn get_timers_with(&mut self, expiry: ExpiryFilter) -> Result<Vec<TimerSlot>> {
        let reply = self.session.request(&codec::encode_timer_query()).await?;
        decode_schedule(&reply, self.family, expiry)
    }

    /// Replace the timer schedule. Slots not given are cleared.
    pub async fn set_timers(&mut self, slots: &[TimerSlot]) -> Result<()> {
        let schedule = encode_schedule(slots, self.family)?;
        self.session.send(&schedule, true, false).await?;
        Ok(())
    }

    /// Find a controller by MAC address using discovery.
    ///
    /// Stops looking as soon as the controller answers. Returns `None` if it
    /// did not answer within the discovery timeout.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mac = "ACCF23A1B2C3".parse()?;
    /// let device = Device::find_by_mac(mac, DeviceFamily::Rgb, DiscoveryConfig::default())
    ///     .await?
    ///     .ok_or(Error::DeviceNotFound(mac))?;
    /// ```
    pub async fn find_by_mac(
        mac: MacAddress,
        family: DeviceFamily,
        config: DiscoveryConfig,
    ) -> Result<Option<Device>> {
        let found = discover(config).await?;
        futures::pin_mut!(found);
        while let Some(device) = found.next().await {
            if device.mac == mac {
                return Ok(Some(device.into_device(family)));
            }
        }
        Ok(None)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} device on {}", self.family, self.session.endpoint())
    }
}

#[cfg(all(test, feature = "runtime-tokio"))]
mod tests {
    use super::*;
    use crate::command::checksum;
    use crate::session::SessionState;
    use crate::types::TimerDays;
    use chrono::{NaiveDate, NaiveTime};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Reads one frame of each given length, answering with the paired reply.
    async fn fake_controller(
        script: Vec<(usize, Option<Vec<u8>>)>,
    ) -> (SocketAddr, JoinHandle<Vec<Vec<u8>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            for (len, reply) in script {
                let mut frame = vec![0u8; len];
                socket.read_exact(&mut frame).await.unwrap();
                received.push(frame);
                if let Some(reply) = reply {
                    socket.write_all(&reply).await.unwrap();
                }
            }
            received
        });
        (addr, handle)
    }

    fn device(addr: SocketAddr, family: DeviceFamily) -> Device {
        let config = SessionConfig::default().with_read_timeout(Duration::from_millis(200));
        Device::with_endpoint(addr, family, config)
    }

    #[tokio::test]
    async fn test_get_status() {
        let reply = vec![
            0x81, 0x44, 0x23, 0x61, 0x21, 0x10, 0x10, 0x20, 0x30, 0x40, 0x06, 0x00, 0x0F, 0x00,
        ];
        let (addr, controller) = fake_controller(vec![(4, Some(reply))]).await;

        let mut device = device(addr, DeviceFamily::RgbWarmWhite);
        let status = device.get_status().await.unwrap();

        assert!(status.is_on());
        assert_eq!(status.mode(), PresetMode::NormalRgb);
        assert_eq!((status.red(), status.green(), status.blue()), (0x10, 0x20, 0x30));
        assert_eq!(status.white1(), Some(0x40));
        assert_eq!(status.white2(), None);
        assert_eq!(controller.await.unwrap(), vec![vec![0x81, 0x8A, 0x8B, 0x96]]);
    }

    #[tokio::test]
    async fn test_turn_on_and_off() {
        let ack = Some(vec![0xF0, 0x71, 0x23, 0x84]);
        let (addr, controller) = fake_controller(vec![(4, ack.clone()), (4, ack)]).await;

        let mut device = device(addr, DeviceFamily::Rgb);
        device.turn_on().await.unwrap();
        device.turn_off().await.unwrap();

        assert_eq!(
            controller.await.unwrap(),
            vec![vec![0x71, 0x23, 0x0F, 0xA3], vec![0x71, 0x24, 0x0F, 0xA4]]
        );
    }

    #[tokio::test]
    async fn test_set_color_without_waiting() {
        let (addr, controller) = fake_controller(vec![(8, None)]).await;

        let mut device = device(addr, DeviceFamily::RgbWarmWhite);
        device
            .set_color(&ChannelSet::rgb(255, 0, 0), true, false)
            .await
            .unwrap();

        assert_eq!(
            controller.await.unwrap(),
            vec![vec![0x31, 0xFF, 0x00, 0x00, 0x00, 0x0F, 0x0F, 0x4E]]
        );
    }

    #[tokio::test]
    async fn test_invalid_color_is_rejected_before_connecting() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 9));
        let mut device = device(addr, DeviceFamily::Rgb);

        let err = device
            .set_color(&ChannelSet::white(10), true, true)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidCombination { .. }));
        assert_eq!(device.session().state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_set_time_expects_no_reply() {
        let (addr, controller) = fake_controller(vec![(12, None)]).await;
        let time = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();

        let mut device = device(addr, DeviceFamily::Rgb);
        device.set_time(time).await.unwrap();

        let frames = controller.await.unwrap();
        assert_eq!(&frames[0][..11], &[0x10, 0x14, 24, 3, 10, 14, 5, 9, 7, 0x00, 0x0F]);
        assert_eq!(frames[0][11], checksum(&frames[0][..11]));
    }

    #[tokio::test]
    async fn test_timers_round_trip_through_controller() {
        let slots = vec![TimerSlot::repeating(
            TimerDays::EVERYDAY,
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            DeviceStatus::rgb(255, 0, 0),
        )];
        let encoded = encode_schedule(&slots, DeviceFamily::RgbWarmWhite).unwrap();
        let mut reply = vec![0x0F, 0x22];
        reply.extend_from_slice(&encoded[1..85]);
        reply.extend_from_slice(&[0x00, 0x00]);

        let (addr, controller) =
            fake_controller(vec![(encoded.len() + 1, None), (5, Some(reply))]).await;

        let mut device = device(addr, DeviceFamily::RgbWarmWhite);
        device.set_timers(&slots).await.unwrap();
        assert_eq!(device.get_timers().await.unwrap(), slots);

        let frames = controller.await.unwrap();
        assert_eq!(frames[0][0], 0x21);
        assert_eq!(frames[0].len(), 88);
        assert_eq!(frames[0][87], checksum(&frames[0][..87]));
        assert_eq!(frames[1], vec![0x22, 0x2A, 0x2B, 0x0F, 0x86]);
    }

    #[tokio::test]
    async fn test_find_by_mac() {
        let responder = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = responder.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buffer = [0u8; 64];
            while let Ok((_, from)) = responder.recv_from(&mut buffer).await {
                for reply in [
                    &b"10.0.0.8,ACCF23000001,AK001-ZJ200"[..],
                    &b"10.0.0.9,ACCF23000002,AK001-ZJ200"[..],
                ] {
                    responder.send_to(reply, from).await.unwrap();
                }
            }
        });
        let config = DiscoveryConfig::default()
            .with_target(target)
            .with_timeout(Duration::from_millis(300))
            .with_recv_timeout(Duration::from_millis(50));

        let mac: MacAddress = "ACCF23000002".parse().unwrap();
        let found = Device::find_by_mac(mac, DeviceFamily::Rgb, config.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.endpoint(), SocketAddr::from(([10, 0, 0, 9], 5577)));
        assert_eq!(found.to_string(), "Rgb device on 10.0.0.9:5577");

        let missing: MacAddress = "ACCF23000003".parse().unwrap();
        let none = Device::find_by_mac(missing, DeviceFamily::Rgb, config)
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
