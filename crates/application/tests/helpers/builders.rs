#![allow(dead_code)]
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub fn query(id: u16, domain: &str, record_type: RecordType) -> Vec<u8> {
    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(question(domain, record_type));
    message.to_vec().unwrap()
}

/// Query carrying an EDNS OPT record, the way most stub resolvers send them.
pub fn edns_query(id: u16, domain: &str, record_type: RecordType) -> Vec<u8> {
    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(question(domain, record_type));
    let mut edns = Edns::new();
    edns.set_max_payload(1232);
    message.set_edns(edns);
    message.to_vec().unwrap()
}

/// Answer for `domain` with a single A record. Owner names use hickory's
/// compression, so they point back at the question.
pub fn answer(id: u16, domain: &str, ip: Ipv4Addr) -> Vec<u8> {
    let mut message = Message::new(id, MessageType::Response, OpCode::Query);
    message.set_recursion_desired(true);
    message.set_recursion_available(true);
    message.add_query(question(domain, RecordType::A));
    message.add_answer(Record::from_rdata(
        Name::from_str(domain).unwrap(),
        300,
        RData::A(A(ip)),
    ));
    message.to_vec().unwrap()
}

fn question(domain: &str, record_type: RecordType) -> Query {
    let mut query = Query::new();
    query.set_name(Name::from_str(domain).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    query
}

/// Bytes after the first question of a message with an uncompressed,
/// single question.
pub fn after_question(message: &[u8]) -> &[u8] {
    let mut pos = 12;
    while message[pos] != 0 {
        pos += 1 + message[pos] as usize;
    }
    &message[pos + 1 + 4..]
}
