//! A channel pinned to a single remote peer

use crate::channel::{Channel, ChannelError};
use crate::config::NetConfig;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

pub struct Endpoint {
    channel: Channel,
    remote: SocketAddr,
}

impl Endpoint {
    /// Resolves `host:port` and binds an ephemeral local socket of the same
    /// address family.
    pub fn connect(host: &str, port: u16, config: &NetConfig) -> Result<Self, ChannelError> {
        let remote = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}:{} did not resolve", host, port),
            )
        })?;

        let local = if remote.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let channel = Channel::bind(local, config)?;

        info!("Endpoint targeting {}", remote);
        Ok(Endpoint { channel, remote })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        self.channel.local_addr()
    }

    pub fn send<T: Serialize + ?Sized>(&self, value: &T) -> Result<usize, ChannelError> {
        self.channel.send(value, self.remote)
    }

    /// Whether a datagram from `addr` counts as coming from the remote peer.
    /// A wildcard host (`0.0.0.0` or `::`) answers from whichever interface
    /// address the datagram arrived on, so only its port is compared. A peer
    /// with several addresses that replies from one other than the resolved
    /// address is treated as a stranger.
    pub fn is_remote(&self, addr: SocketAddr) -> bool {
        if self.remote.ip().is_unspecified() {
            addr.port() == self.remote.port()
        } else {
            addr == self.remote
        }
    }

    /// Datagrams from anyone but the remote peer are dropped.
    pub fn receive<T: DeserializeOwned + Serialize>(&self) -> Option<T> {
        self.channel
            .receive()
            .and_then(|(value, addr)| self.is_remote(addr).then_some(value))
    }

    pub fn drain<T: DeserializeOwned + Serialize>(&self) -> Vec<T> {
        self.channel
            .drain()
            .into_iter()
            .filter(|(_, addr)| self.is_remote(*addr))
            .map(|(value, _)| value)
            .collect()
    }

    pub fn close(&mut self) {
        self.channel.close();
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}
