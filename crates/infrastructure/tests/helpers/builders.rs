#![allow(dead_code)]
use dnsgate_infrastructure::packet::ipv4_udp;
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 50, 2);
pub const CLIENT_PORT: u16 = 40_000;

pub fn query(id: u16, domain: &str) -> Vec<u8> {
    question_message(id, domain).to_vec().unwrap()
}

/// Query with an EDNS OPT record in the additional section.
pub fn edns_query(id: u16, domain: &str) -> Vec<u8> {
    let mut message = question_message(id, domain);
    let mut edns = Edns::new();
    edns.set_max_payload(1232);
    message.set_edns(edns);
    message.to_vec().unwrap()
}

fn question_message(id: u16, domain: &str) -> Message {
    let mut query = Query::new();
    query.set_name(Name::from_str(domain).unwrap());
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);
    message
}

/// Frame a client would push into the tunnel toward `resolver:53`.
pub fn client_frame(resolver: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    ipv4_udp::build(CLIENT_IP, resolver, CLIENT_PORT, 53, payload).unwrap()
}

/// Decoded view of a frame written back into the tunnel.
#[derive(Debug)]
pub struct WrittenFrame {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub header_checksum_ok: bool,
    pub payload: Vec<u8>,
}

impl WrittenFrame {
    pub fn decode(frame: &[u8]) -> Self {
        assert_eq!(frame[0], 0x45, "expected a 20 byte IPv4 header");
        assert_eq!(frame[9], 17, "expected UDP");
        let udp = &frame[20..];
        Self {
            src_ip: Ipv4Addr::new(frame[12], frame[13], frame[14], frame[15]),
            dst_ip: Ipv4Addr::new(frame[16], frame[17], frame[18], frame[19]),
            src_port: u16::from_be_bytes([udp[0], udp[1]]),
            dst_port: u16::from_be_bytes([udp[2], udp[3]]),
            header_checksum_ok: ipv4_udp::ipv4_checksum(&frame[..20]) == 0,
            payload: udp[8..].to_vec(),
        }
    }

    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.payload[0], self.payload[1]])
    }
}
