//! Minimal DNS wire-format helpers (RFC 1035 §4)
//!
//! Only what the gateway needs to relocate and restore the queried name and to
//! bootstrap upstream hostnames. This is not a general message parser: name
//! compression is skipped, never followed.

use crate::DomainError;
use std::net::Ipv4Addr;

/// Fixed DNS header length.
pub const HEADER_LEN: usize = 12;

pub const TYPE_A: u16 = 1;
pub const CLASS_IN: u16 = 1;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
const POINTER_MASK: u8 = 0xC0;

/// Standard query, recursion desired.
const QUERY_FLAGS: [u8; 2] = [0x01, 0x00];

/// Reads the name starting at `offset`.
///
/// Returns the dotted name and the number of bytes the encoded name occupies.
/// A compression pointer terminates the walk: its two bytes are counted and the
/// labels read so far are returned.
pub fn parse_qname(buf: &[u8], offset: usize) -> Result<(String, usize), DomainError> {
    walk_qname(buf, offset).map(|(name, len, _)| (name, len))
}

/// Returns `true` when the name at `offset` ends in a compression pointer.
pub fn qname_is_compressed(buf: &[u8], offset: usize) -> Result<bool, DomainError> {
    walk_qname(buf, offset).map(|(_, _, compressed)| compressed)
}

fn walk_qname(buf: &[u8], offset: usize) -> Result<(String, usize, bool), DomainError> {
    let mut pos = offset;
    let mut labels: Vec<String> = Vec::new();
    let mut compressed = false;

    loop {
        let len = *buf.get(pos).ok_or_else(|| truncated("name", offset))?;

        if len == 0 {
            pos += 1;
            break;
        }

        if len & POINTER_MASK == POINTER_MASK {
            if pos + 2 > buf.len() {
                return Err(truncated("compression pointer", offset));
            }
            pos += 2;
            compressed = true;
            break;
        }

        let len = len as usize;
        if len > MAX_LABEL_LEN {
            return Err(DomainError::InvalidDnsMessage(format!(
                "label length {} at offset {} exceeds {}",
                len, pos, MAX_LABEL_LEN
            )));
        }

        let label = buf
            .get(pos + 1..pos + 1 + len)
            .ok_or_else(|| truncated("label", offset))?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += 1 + len;
    }

    Ok((labels.join("."), pos - offset, compressed))
}

/// Encodes a dotted name as length-prefixed labels terminated by a zero byte.
/// Empty labels (a trailing dot, or the root name) are skipped.
pub fn encode_qname(domain: &str) -> Result<Vec<u8>, DomainError> {
    let mut out = Vec::with_capacity(domain.len() + 2);

    for label in domain.split('.').filter(|l| !l.is_empty()) {
        if label.len() > MAX_LABEL_LEN {
            return Err(DomainError::InvalidDomainName(format!(
                "label '{}' in '{}' is longer than {} bytes",
                label, domain, MAX_LABEL_LEN
            )));
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);

    if out.len() > MAX_NAME_LEN {
        return Err(DomainError::InvalidDomainName(format!(
            "'{}' encodes to {} bytes (max {})",
            domain,
            out.len(),
            MAX_NAME_LEN
        )));
    }

    Ok(out)
}

/// Builds a single-question A/IN query with a random transaction ID.
pub fn build_minimal_query(domain: &str) -> Result<Vec<u8>, DomainError> {
    let qname = encode_qname(domain)?;
    let mut query = Vec::with_capacity(HEADER_LEN + qname.len() + 4);

    query.extend_from_slice(&fastrand::u16(..).to_be_bytes());
    query.extend_from_slice(&QUERY_FLAGS);
    query.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    query.extend_from_slice(&[0; 6]); // AN/NS/AR
    query.extend_from_slice(&qname);
    query.extend_from_slice(&TYPE_A.to_be_bytes());
    query.extend_from_slice(&CLASS_IN.to_be_bytes());

    Ok(query)
}

/// Scans the answer section for the first A record with a 4-byte RDATA.
pub fn first_a_record(response: &[u8]) -> Option<Ipv4Addr> {
    if response.len() < HEADER_LEN {
        return None;
    }
    let ancount = u16::from_be_bytes([response[6], response[7]]);
    if ancount == 0 {
        return None;
    }

    let (_, qname_len) = parse_qname(response, HEADER_LEN).ok()?;
    let mut pos = HEADER_LEN + qname_len + 4;

    for _ in 0..ancount {
        let (_, name_len) = parse_qname(response, pos).ok()?;
        pos += name_len;

        let fixed = response.get(pos..pos + 10)?;
        let rtype = u16::from_be_bytes([fixed[0], fixed[1]]);
        let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]) as usize;
        pos += 10;

        if rtype == TYPE_A && rdlength == 4 {
            let rdata = response.get(pos..pos + 4)?;
            return Some(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]));
        }
        pos += rdlength;
    }

    None
}

/// Transaction ID of a message, if it carries a full header.
pub fn transaction_id(message: &[u8]) -> Option<u16> {
    if message.len() < HEADER_LEN {
        return None;
    }
    Some(u16::from_be_bytes([message[0], message[1]]))
}

pub fn set_transaction_id(message: &mut [u8], id: u16) {
    if message.len() >= 2 {
        message[..2].copy_from_slice(&id.to_be_bytes());
    }
}

fn truncated(what: &str, offset: usize) -> DomainError {
    DomainError::InvalidDnsMessage(format!("truncated {} starting at offset {}", what, offset))
}
