#![allow(dead_code)]
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::{A, CNAME};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Builds a response answering `domain` with a CNAME hop followed by an A record.
pub fn response_with_cname(id: u16, domain: &str, alias: &str, ip: Ipv4Addr) -> Vec<u8> {
    let name = Name::from_str(domain).unwrap();
    let alias_name = Name::from_str(alias).unwrap();

    let mut message = base_response(id, &name);
    message.add_answer(Record::from_rdata(
        name,
        60,
        RData::CNAME(CNAME(alias_name.clone())),
    ));
    message.add_answer(Record::from_rdata(alias_name, 60, RData::A(A(ip))));
    message.to_vec().unwrap()
}

pub fn response_with_a(id: u16, domain: &str, ip: Ipv4Addr) -> Vec<u8> {
    let name = Name::from_str(domain).unwrap();
    let mut message = base_response(id, &name);
    message.add_answer(Record::from_rdata(name, 300, RData::A(A(ip))));
    message.to_vec().unwrap()
}

pub fn empty_response(id: u16, domain: &str) -> Vec<u8> {
    let name = Name::from_str(domain).unwrap();
    base_response(id, &name).to_vec().unwrap()
}

fn base_response(id: u16, name: &Name) -> Message {
    let mut query = Query::new();
    query.set_name(name.clone());
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(id, MessageType::Response, OpCode::Query);
    message.set_recursion_desired(true);
    message.set_recursion_available(true);
    message.add_query(query);
    message
}
