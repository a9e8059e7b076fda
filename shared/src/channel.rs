//! UDP transport carrying codec-encoded, optionally LZ4-compressed, structured values
//!
//! A channel owns one non-blocking socket. Sends are fire-and-forget; receives
//! never block and never fail loudly: anything that cannot be turned back into
//! a non-empty mapping or sequence is dropped and logged at debug level.

use crate::codec::{Codec, CodecError};
use crate::config::NetConfig;
use log::{debug, info};
use lz4_flex::block::DecompressError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use thiserror::Error;

/// Largest datagram read off the socket. Longer datagrams arrive truncated and
/// fail to decode.
pub const MAX_DATAGRAM_SIZE: usize = 512;

/// Upper bound on decompressed payloads. Compressed payloads are an LZ4 block
/// behind a little-endian `u32` holding the decompressed size.
const MAX_INFLATED_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("only mappings and sequences can be sent")]
    NotStructured,
    #[error("payload does not decompress: {0}")]
    Decompress(#[from] DecompressError),
    #[error("decompressed payload of {0} bytes is too large")]
    TooLarge(usize),
    #[error("payload decoded to an empty value")]
    Empty,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("channel is closed")]
    Closed,
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        ChannelError::Codec(CodecError::Json(e))
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

fn is_deliverable(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        _ => false,
    }
}

/// Serializes `value` into a datagram payload.
pub fn pack<T: Serialize + ?Sized>(config: &NetConfig, value: &T) -> Result<Vec<u8>, ChannelError> {
    if !is_structured(&serde_json::to_value(value)?) {
        return Err(ChannelError::NotStructured);
    }

    let encoded = config.codec.encode(value)?;
    if !config.compression {
        return Ok(encoded);
    }

    Ok(lz4_flex::compress_prepend_size(&encoded))
}

/// Reverses [`pack`], rejecting payloads that decode to nothing useful.
pub fn unpack<T: DeserializeOwned + Serialize>(
    config: &NetConfig,
    payload: &[u8],
) -> Result<T, ChannelError> {
    let value: T = if config.compression {
        let (size, _) = lz4_flex::block::uncompressed_size(payload)?;
        if size > MAX_INFLATED_SIZE {
            return Err(ChannelError::TooLarge(size));
        }
        let inflated = lz4_flex::decompress_size_prepended(payload)?;
        config.codec.decode(&inflated)?
    } else {
        config.codec.decode(payload)?
    };

    if !is_deliverable(&serde_json::to_value(&value)?) {
        return Err(ChannelError::Empty);
    }
    Ok(value)
}

pub struct Channel {
    socket: Option<UdpSocket>,
    config: NetConfig,
}

impl Channel {
    pub fn bind<A: ToSocketAddrs>(addr: A, config: &NetConfig) -> Result<Self, ChannelError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        debug!(
            "Channel bound on {} (codec {}, compression {})",
            socket.local_addr()?,
            config.codec,
            config.compression
        );

        Ok(Channel {
            socket: Some(socket),
            config: *config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        let socket = self.socket.as_ref().ok_or(ChannelError::Closed)?;
        Ok(socket.local_addr()?)
    }

    pub fn codec(&self) -> Codec {
        self.config.codec
    }

    pub fn compression(&self) -> bool {
        self.config.compression
    }

    /// Writes `value` as one datagram to `addr`, returning the bytes sent.
    pub fn send<T: Serialize + ?Sized>(
        &self,
        value: &T,
        addr: SocketAddr,
    ) -> Result<usize, ChannelError> {
        let socket = self.socket.as_ref().ok_or(ChannelError::Closed)?;
        let payload = pack(&self.config, value)?;
        Ok(socket.send_to(&payload, addr)?)
    }

    /// One non-blocking read attempt.
    pub fn receive<T: DeserializeOwned + Serialize>(&self) -> Option<(T, SocketAddr)> {
        match self.recv_datagram() {
            Ok((payload, addr)) => self.accept(&payload, addr),
            Err(e) => {
                if e.kind() != io::ErrorKind::WouldBlock {
                    debug!("Receive failed: {}", e);
                }
                None
            }
        }
    }

    /// Reads until the socket would block, keeping every deliverable value in
    /// arrival order.
    pub fn drain<T: DeserializeOwned + Serialize>(&self) -> Vec<(T, SocketAddr)> {
        let mut delivered = Vec::new();

        loop {
            match self.recv_datagram() {
                Ok((payload, addr)) => {
                    if let Some(item) = self.accept(&payload, addr) {
                        delivered.push(item);
                    }
                }
                Err(e) => {
                    if e.kind() != io::ErrorKind::WouldBlock {
                        debug!("Drain stopped: {}", e);
                    }
                    break;
                }
            }
        }

        delivered
    }

    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            if let Ok(addr) = socket.local_addr() {
                info!("Channel on {} closed", addr);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn recv_datagram(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let (len, addr) = socket.recv_from(&mut buffer)?;
        Ok((buffer[..len].to_vec(), addr))
    }

    fn accept<T: DeserializeOwned + Serialize>(
        &self,
        payload: &[u8],
        addr: SocketAddr,
    ) -> Option<(T, SocketAddr)> {
        match unpack(&self.config, payload) {
            Ok(value) => Some((value, addr)),
            Err(e) => {
                debug!("Dropped {} byte datagram from {}: {}", payload.len(), addr, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::thread;
    use std::time::{Duration, Instant};

    fn loopback(config: &NetConfig) -> Channel {
        Channel::bind("127.0.0.1:0", config).unwrap()
    }

    fn receive_within<T: DeserializeOwned + Serialize>(
        channel: &Channel,
        timeout: Duration,
    ) -> Option<(T, SocketAddr)> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(item) = channel.receive() {
                return Some(item);
            }
            thread::sleep(Duration::from_millis(2));
        }
        None
    }

    fn scores(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_send_receive_every_codec_and_compression() {
        for codec in Codec::ALL {
            for compression in [false, true] {
                let config = NetConfig { codec, compression };
                let sender = loopback(&config);
                let receiver = loopback(&config);
                let value = scores(&[("p1", 3), ("p2", 7)]);

                sender.send(&value, receiver.local_addr().unwrap()).unwrap();
                let (got, from): (BTreeMap<String, u32>, _) =
                    receive_within(&receiver, Duration::from_secs(1)).unwrap();

                assert_eq!(got, value, "codec {} compression {}", codec, compression);
                assert_eq!(from, sender.local_addr().unwrap());
            }
        }
    }

    #[test]
    fn test_scalar_send_is_not_structured() {
        let config = NetConfig::default();
        let sender = loopback(&config);
        let receiver = loopback(&config);
        let target = receiver.local_addr().unwrap();

        assert!(matches!(
            sender.send(&42u32, target),
            Err(ChannelError::NotStructured)
        ));
        assert!(matches!(
            sender.send("hello", target),
            Err(ChannelError::NotStructured)
        ));

        sender.send(&vec![1u32], target).unwrap();
        let (got, _): (Vec<u32>, _) = receive_within(&receiver, Duration::from_secs(1)).unwrap();
        assert_eq!(got, vec![1]);
    }

    #[test]
    fn test_empty_value_never_delivered() {
        let config = NetConfig::default();
        let sender = loopback(&config);
        let receiver = loopback(&config);
        let target = receiver.local_addr().unwrap();

        sender.send(&BTreeMap::<String, u32>::new(), target).unwrap();
        sender.send(&scores(&[("p1", 1)]), target).unwrap();

        let (got, _): (BTreeMap<String, u32>, _) =
            receive_within(&receiver, Duration::from_secs(1)).unwrap();
        assert_eq!(got, scores(&[("p1", 1)]));
    }

    #[test]
    fn test_malformed_datagram_is_dropped() {
        let config = NetConfig {
            codec: Codec::Json,
            compression: true,
        };
        let receiver = loopback(&config);
        let target = receiver.local_addr().unwrap();

        let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
        raw.send_to(b"\x08\x00\x00\x00not lz4", target).unwrap();

        let sender = loopback(&config);
        sender.send(&vec![9u32], target).unwrap();

        let (got, _): (Vec<u32>, _) = receive_within(&receiver, Duration::from_secs(1)).unwrap();
        assert_eq!(got, vec![9]);
    }

    #[test]
    fn test_mismatched_codec_is_dropped() {
        let receiver = loopback(&NetConfig {
            codec: Codec::Json,
            compression: false,
        });
        let target = receiver.local_addr().unwrap();

        let postcard = loopback(&NetConfig {
            codec: Codec::Postcard,
            compression: false,
        });
        postcard.send(&vec![200u32, 300], target).unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(receiver.drain::<Vec<u32>>().is_empty());
    }

    #[test]
    fn test_drain_keeps_arrival_order() {
        let config = NetConfig::default();
        let sender = loopback(&config);
        let receiver = loopback(&config);
        let target = receiver.local_addr().unwrap();

        for i in 1..=5u32 {
            sender.send(&vec![i], target).unwrap();
        }
        thread::sleep(Duration::from_millis(50));

        let got: Vec<u32> = receiver
            .drain::<Vec<u32>>()
            .into_iter()
            .map(|(v, _)| v[0])
            .collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_receive_on_idle_socket_is_none() {
        let channel = loopback(&NetConfig::default());
        assert!(channel.receive::<Vec<u32>>().is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let config = NetConfig::default();
        let mut channel = loopback(&config);
        let peer = loopback(&config);

        channel.close();
        channel.close();

        assert!(channel.is_closed());
        assert!(matches!(
            channel.send(&vec![1u32], peer.local_addr().unwrap()),
            Err(ChannelError::Closed)
        ));
        assert!(channel.receive::<Vec<u32>>().is_none());
        assert!(channel.drain::<Vec<u32>>().is_empty());
    }

    #[test]
    fn test_oversized_decompressed_length_is_refused() {
        let config = NetConfig {
            codec: Codec::Json,
            compression: true,
        };
        let mut payload = (u32::MAX).to_le_bytes().to_vec();
        payload.extend_from_slice(b"\x10x");
        assert!(matches!(
            unpack::<Vec<u32>>(&config, &payload),
            Err(ChannelError::TooLarge(_))
        ));
    }

    #[test]
    fn test_compressed_payload_carries_size_prefix() {
        let config = NetConfig {
            codec: Codec::Json,
            compression: true,
        };
        let payload = pack(&config, &vec![7u32; 40]).unwrap();
        let plain = Codec::Json.encode(&vec![7u32; 40]).unwrap();
        assert_eq!(payload[..4], (plain.len() as u32).to_le_bytes());
        assert!(payload.len() < plain.len());
    }

    #[test]
    fn test_unpack_rejects_empty_sequence() {
        let config = NetConfig::default();
        let payload = pack(&config, &Vec::<u32>::new()).unwrap();
        assert!(matches!(
            unpack::<Vec<u32>>(&config, &payload),
            Err(ChannelError::Empty)
        ));
    }
}
