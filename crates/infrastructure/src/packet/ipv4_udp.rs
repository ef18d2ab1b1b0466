//! IPv4/UDP framing for packets crossing the tunnel
//!
//! Inbound frames are filtered down to UDP datagrams addressed to port 53;
//! everything else is ignored. Outbound frames carry a fresh IPv4 header
//! with a valid checksum and a zero UDP checksum (legal for IPv4).

use dnsgate_domain::DomainError;
use std::net::Ipv4Addr;

pub const DNS_PORT: u16 = 53;

const IPV4_MIN_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const PROTO_UDP: u8 = 17;
const DEFAULT_TTL: u8 = 64;
/// Flags: don't fragment.
const FLAGS_DF: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram<'a> {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

/// Returns `None` for anything that is not IPv4/UDP to port 53.
pub fn parse(frame: &[u8]) -> Option<UdpDatagram<'_>> {
    if frame.len() < IPV4_MIN_HEADER_LEN || frame[0] >> 4 != 4 {
        return None;
    }

    let ihl = ((frame[0] & 0x0F) as usize) * 4;
    if ihl < IPV4_MIN_HEADER_LEN || frame[9] != PROTO_UDP {
        return None;
    }

    // Trailing link padding is not part of the datagram.
    let total_len = u16::from_be_bytes([frame[2], frame[3]]) as usize;
    let end = if total_len >= ihl + UDP_HEADER_LEN && total_len <= frame.len() {
        total_len
    } else {
        frame.len()
    };
    if end < ihl + UDP_HEADER_LEN {
        return None;
    }

    let udp = &frame[ihl..end];
    let dst_port = u16::from_be_bytes([udp[2], udp[3]]);
    if dst_port != DNS_PORT {
        return None;
    }

    Some(UdpDatagram {
        src_ip: Ipv4Addr::new(frame[12], frame[13], frame[14], frame[15]),
        dst_ip: Ipv4Addr::new(frame[16], frame[17], frame[18], frame[19]),
        src_port: u16::from_be_bytes([udp[0], udp[1]]),
        dst_port,
        payload: &udp[UDP_HEADER_LEN..],
    })
}

pub fn build(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Result<Vec<u8>, DomainError> {
    let udp_len = UDP_HEADER_LEN + payload.len();
    let total_len = IPV4_MIN_HEADER_LEN + udp_len;
    let total_len_u16 = u16::try_from(total_len).map_err(|_| {
        DomainError::InvalidPacket(format!("{} byte payload does not fit in IPv4", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(total_len);
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&total_len_u16.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]); // identification
    frame.extend_from_slice(&[FLAGS_DF, 0x00]);
    frame.extend_from_slice(&[DEFAULT_TTL, PROTO_UDP]);
    frame.extend_from_slice(&[0x00, 0x00]); // checksum, filled below
    frame.extend_from_slice(&src_ip.octets());
    frame.extend_from_slice(&dst_ip.octets());

    let checksum = ipv4_checksum(&frame[..IPV4_MIN_HEADER_LEN]);
    frame[10..12].copy_from_slice(&checksum.to_be_bytes());

    frame.extend_from_slice(&src_port.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&(udp_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(payload);

    Ok(frame)
}

/// One's-complement sum of 16-bit words with carry folding (RFC 1071).
///
/// Over a header whose checksum field is zero this yields the value to store;
/// over a header carrying its checksum it yields 0.
pub fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|w| match *w {
            [hi, lo] => u16::from_be_bytes([hi, lo]) as u32,
            [hi] => (hi as u32) << 8,
            _ => 0,
        })
        .sum();

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_vector() {
        // Wikipedia IPv4 header checksum example.
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(ipv4_checksum(&header), 0xb861);
    }

    #[test]
    fn test_checksum_odd_length() {
        assert_eq!(ipv4_checksum(&[0xFF]), !0xFF00);
    }

    #[test]
    fn test_rejects_ipv6() {
        let mut frame = vec![0u8; 48];
        frame[0] = 0x60;
        assert!(parse(&frame).is_none());
    }
}
