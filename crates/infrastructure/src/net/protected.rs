//! Outbound sockets that bypass the tunnel
//!
//! Every socket is handed to the [`SocketProtector`] before it is bound or
//! connected.

use dnsgate_application::ports::SocketProtector;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream, UdpSocket};

/// Wildcard bind address of the same family as `peer`.
pub fn unspecified_for(peer: &SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

/// Protected, bound, non-blocking std socket. QUIC endpoints take this form.
pub fn std_udp_socket(
    protector: &dyn SocketProtector,
    bind: SocketAddr,
) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(bind), Type::DGRAM, Some(Protocol::UDP))?;
    protector.protect(&socket)?;

    socket.bind(&bind.into())?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

pub fn udp_socket(protector: &dyn SocketProtector, bind: SocketAddr) -> io::Result<UdpSocket> {
    UdpSocket::from_std(std_udp_socket(protector, bind)?)
}

pub async fn tcp_connect(
    protector: &dyn SocketProtector,
    addr: SocketAddr,
    timeout: Duration,
) -> io::Result<TcpStream> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    protector.protect(&SockRef::from(&socket))?;
    socket.set_nodelay(true)?;

    tokio::time::timeout(timeout, socket.connect(addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("connect to {} timed out", addr)))?
}
