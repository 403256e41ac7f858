//! UDP transport (unicast list or broadcast)

use std::io;
use std::net::{SocketAddr, UdpSocket};

use super::StateTransport;
use crate::error::{ConfigError, ConfigResult};

/// Non-blocking UDP socket sending each datagram to a fixed target list
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    targets: Vec<SocketAddr>,
}

impl UdpTransport {
    /// Bind `bind` and prepare to send to `targets`
    ///
    /// Failure here is fatal setup: a node without its transport has no
    /// defined role in the cluster.
    pub fn bind(bind: &str, targets: &[String], broadcast: bool) -> ConfigResult<Self> {
        let bind_addr: SocketAddr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(bind.to_string()))?;
        let targets = targets
            .iter()
            .map(|t| {
                t.parse::<SocketAddr>()
                    .map_err(|_| ConfigError::InvalidAddress(t.clone()))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let unavailable = |e: io::Error| ConfigError::TransportUnavailable {
            addr: bind.to_string(),
            reason: e.to_string(),
        };
        let socket = UdpSocket::bind(bind_addr).map_err(unavailable)?;
        socket.set_nonblocking(true).map_err(unavailable)?;
        if broadcast {
            socket.set_broadcast(true).map_err(unavailable)?;
        }

        log::info!(
            "[REPL] UDP transport bound to {} ({} target(s){})",
            socket.local_addr().map_err(unavailable)?,
            targets.len(),
            if broadcast { ", broadcast" } else { "" }
        );
        Ok(Self { socket, targets })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn targets(&self) -> &[SocketAddr] {
        &self.targets
    }
}

impl StateTransport for UdpTransport {
    /// Sends to every target; reports the first failure after trying all
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let mut first_error = None;
        for target in &self.targets {
            if let Err(e) = self.socket.send_to(datagram, target) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((n, _from)) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}
