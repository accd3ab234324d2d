//! LIFX bulbs over the LAN protocol

use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use lifx_core::{BuildOptions, Message, RawMessage, HSBK};
use tokio::net::UdpSocket;

use super::{Bulb, BulbError};
use crate::{color::Hsbk, models::BulbConfig};

/// UDP port LIFX devices listen on
pub const DEFAULT_PORT: u16 = 56700;

/// Parse a bulb serial number (its MAC address) into a LIFX target
///
/// Accepts 12 hexadecimal digits, optionally separated by `:` or `-`.
pub fn parse_serial(serial: &str) -> Result<u64, BulbError> {
    let digits: String = serial
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect();

    if digits.len() != 12 || !digits.is_ascii() {
        return Err(BulbError::InvalidSerial(serial.to_owned()));
    }

    let mut bytes = [0u8; 8];
    for (i, byte) in bytes.iter_mut().take(6).enumerate() {
        *byte = u8::from_str_radix(&digits[2 * i..2 * i + 2], 16)
            .map_err(|_| BulbError::InvalidSerial(serial.to_owned()))?;
    }

    // The target field carries the MAC bytes in order
    Ok(u64::from_le_bytes(bytes))
}

async fn resolve(address: &str) -> Result<SocketAddr, BulbError> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    let host = if address.contains(':') {
        address.to_owned()
    } else {
        format!("{}:{}", address, DEFAULT_PORT)
    };

    let mut addrs = tokio::net::lookup_host(host.as_str()).await?;
    addrs
        .next()
        .ok_or_else(|| BulbError::Resolve(address.to_owned()))
}

impl From<Hsbk> for HSBK {
    fn from(color: Hsbk) -> Self {
        HSBK {
            hue: color.hue,
            saturation: color.saturation,
            brightness: color.brightness,
            kelvin: color.kelvin,
        }
    }
}

pub struct LifxBulb {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    target: Option<u64>,
    source: u32,
    sequence: u8,
    timeout: Duration,
    buffer: Vec<u8>,
}

impl LifxBulb {
    #[instrument(skip(config), fields(address = %config.address))]
    pub async fn new(config: &BulbConfig) -> Result<Self, BulbError> {
        let remote_addr = resolve(&config.address).await?;
        let target = config.serial.as_deref().map(parse_serial).transpose()?;

        // Choose correct IP version for local addr
        let local_addr = if remote_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(local_addr).await?;
        socket.set_broadcast(true)?;

        debug!(remote = %remote_addr, ?target, "bound bulb socket");

        Ok(Self {
            socket,
            remote_addr,
            target,
            // Sources 0 and 1 make devices broadcast their replies
            source: std::process::id().max(2),
            sequence: 0,
            timeout: Duration::from_millis(config.timeout_ms),
            buffer: vec![0; 1024],
        })
    }

    async fn send(
        &mut self,
        message: Message,
        ack_required: bool,
        res_required: bool,
    ) -> Result<u8, BulbError> {
        self.sequence = self.sequence.wrapping_add(1);

        let options = BuildOptions {
            target: self.target,
            ack_required,
            res_required,
            sequence: self.sequence,
            source: self.source,
        };

        let packet = RawMessage::build(&options, message)?.pack()?;
        self.socket.send_to(&packet, self.remote_addr).await?;

        Ok(self.sequence)
    }

    async fn recv_reply(&mut self, sequence: u8) -> Result<Message, BulbError> {
        loop {
            let (len, peer) = self.socket.recv_from(&mut self.buffer).await?;

            let raw = match RawMessage::unpack(&self.buffer[..len]) {
                Ok(raw) => raw,
                Err(error) => {
                    debug!(peer = %peer, error = %error, "ignoring invalid datagram");
                    continue;
                }
            };

            // Sequence numbers wrap after 256 requests, a reply to a timed out request can reuse
            // the current one. Replies from other devices are told apart by their target.
            if raw.frame.source != self.source
                || raw.frame_addr.sequence != sequence
                || self.target.map_or(false, |target| raw.frame_addr.target != target)
            {
                trace!(peer = %peer, "ignoring unrelated reply");
                continue;
            }

            return Ok(Message::from_raw(&raw)?);
        }
    }

    /// Send a message and wait for the matching reply
    async fn request(
        &mut self,
        message: Message,
        ack_required: bool,
        res_required: bool,
    ) -> Result<Message, BulbError> {
        let sequence = self.send(message, ack_required, res_required).await?;
        let timeout = self.timeout;

        tokio::time::timeout(timeout, self.recv_reply(sequence))
            .await
            .map_err(|_| BulbError::Timeout(timeout))?
    }
}

#[async_trait]
impl Bulb for LifxBulb {
    async fn set_color(
        &mut self,
        color: Hsbk,
        transition: Duration,
        wait_for_ack: bool,
    ) -> Result<(), BulbError> {
        let message = Message::LightSetColor {
            reserved: 0,
            color: color.into(),
            duration: transition.as_millis().min(u32::MAX as u128) as u32,
        };

        if !wait_for_ack {
            self.send(message, false, false).await?;
            return Ok(());
        }

        match self.request(message, true, false).await? {
            Message::Acknowledgement { .. } => Ok(()),
            other => Err(BulbError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    async fn label(&mut self) -> Result<String, BulbError> {
        match self.request(Message::GetLabel, false, true).await? {
            Message::StateLabel { label } => Ok(label.to_string()),
            other => Err(BulbError::UnexpectedReply(format!("{:?}", other))),
        }
    }
}

impl std::fmt::Debug for LifxBulb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifxBulb")
            .field("remote_addr", &self.remote_addr)
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulb::label_or_placeholder;

    /// Fake bulb socket on the loopback interface
    async fn fake_bulb() -> (UdpSocket, BulbConfig) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = BulbConfig {
            address: socket.local_addr().unwrap().to_string(),
            timeout_ms: 100,
            ..Default::default()
        };

        (socket, config)
    }

    async fn receive(socket: &UdpSocket) -> (RawMessage, SocketAddr) {
        let mut buf = vec![0; 1024];
        let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
        (RawMessage::unpack(&buf[..len]).unwrap(), peer)
    }

    #[tokio::test]
    async fn test_resolve_addresses() {
        assert_eq!(
            SocketAddr::from(([192, 168, 1, 20], DEFAULT_PORT)),
            resolve("192.168.1.20").await.unwrap()
        );
        assert_eq!(
            SocketAddr::from(([192, 168, 1, 20], 1234)),
            resolve("192.168.1.20:1234").await.unwrap()
        );

        let local = resolve("localhost:1234").await.unwrap();
        assert!(local.ip().is_loopback());
        assert_eq!(1234, local.port());
    }

    #[test]
    fn test_parse_serial() {
        assert_eq!(0x0302_01d5_73d0, parse_serial("d0:73:d5:01:02:03").unwrap());
        assert_eq!(0x0302_01d5_73d0, parse_serial("D073D5010203").unwrap());
        assert!(parse_serial("d0:73:d5").is_err());
        assert!(parse_serial("zz:73:d5:01:02:03").is_err());
    }

    #[tokio::test]
    async fn test_set_color_waits_for_ack() {
        let (device, config) = fake_bulb().await;
        let mut bulb = LifxBulb::new(&config).await.unwrap();

        let color = Hsbk::new(1000, 2000, 3000, 3500);
        let (result, (raw, peer)) = tokio::join!(
            bulb.set_color(color, Duration::from_millis(67), true),
            async {
                let (raw, peer) = receive(&device).await;

                let ack = RawMessage::build(
                    &BuildOptions {
                        target: None,
                        ack_required: false,
                        res_required: false,
                        sequence: raw.frame_addr.sequence,
                        source: raw.frame.source,
                    },
                    Message::Acknowledgement {
                        seq: raw.frame_addr.sequence,
                    },
                )
                .unwrap();
                device.send_to(&ack.pack().unwrap(), peer).await.unwrap();

                (raw, peer)
            }
        );

        result.expect("set_color failed");
        assert!(raw.frame_addr.ack_required);
        assert_eq!(bulb.socket.local_addr().unwrap().port(), peer.port());

        match Message::from_raw(&raw).unwrap() {
            Message::LightSetColor {
                color: sent,
                duration,
                ..
            } => {
                assert_eq!(
                    (1000, 2000, 3000, 3500),
                    (sent.hue, sent.saturation, sent.brightness, sent.kelvin)
                );
                assert_eq!(67, duration);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replies_from_other_devices_are_ignored() {
        let (device, mut config) = fake_bulb().await;
        config.serial = Some("d0:73:d5:01:02:03".to_owned());
        let target = parse_serial("d0:73:d5:01:02:03").unwrap();
        let mut bulb = LifxBulb::new(&config).await.unwrap();

        let (result, ()) = tokio::join!(
            bulb.set_color(Hsbk::default(), Duration::ZERO, true),
            async {
                let (raw, peer) = receive(&device).await;
                assert_eq!(target, raw.frame_addr.target);

                // Same source and sequence, but from another bulb
                let ack = RawMessage::build(
                    &BuildOptions {
                        target: Some(target + 1),
                        ack_required: false,
                        res_required: false,
                        sequence: raw.frame_addr.sequence,
                        source: raw.frame.source,
                    },
                    Message::Acknowledgement {
                        seq: raw.frame_addr.sequence,
                    },
                )
                .unwrap();
                device.send_to(&ack.pack().unwrap(), peer).await.unwrap();
            }
        );

        assert!(matches!(result, Err(BulbError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_set_color_without_ack_returns_immediately() {
        let (device, config) = fake_bulb().await;
        let mut bulb = LifxBulb::new(&config).await.unwrap();

        bulb.set_color(Hsbk::default(), Duration::ZERO, false)
            .await
            .unwrap();

        let (raw, _) = receive(&device).await;
        assert!(!raw.frame_addr.ack_required);
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        let (_device, config) = fake_bulb().await;
        let mut bulb = LifxBulb::new(&config).await.unwrap();

        let error = bulb
            .set_color(Hsbk::default(), Duration::ZERO, true)
            .await
            .unwrap_err();

        assert!(matches!(error, BulbError::Timeout(_)));
        assert!(error.is_transient());

        assert_eq!("<LABEL-ERR>", label_or_placeholder(&mut bulb).await);
    }
}
