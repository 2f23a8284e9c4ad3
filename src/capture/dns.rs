//! A/AAAA answers of DNS responses, enough to learn which name an address serves.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::DecodeSkip;

const HEADER_LEN: usize = 12;
const TYPE_A: u16 = 1;
const TYPE_AAAA: u16 = 28;
const MAX_POINTER_HOPS: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsAnswer {
    pub ip: IpAddr,
    /// Lowercased owner name of the record.
    pub name: String,
}

fn be16(msg: &[u8], pos: usize) -> Result<u16, DecodeSkip> {
    msg.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(DecodeSkip::MalformedDns("truncated message"))
}

/// Reads a possibly compressed name at `pos`; returns it and the position after it.
fn read_name(msg: &[u8], mut pos: usize) -> Result<(String, usize), DecodeSkip> {
    let mut labels: Vec<String> = Vec::new();
    let mut resume: Option<usize> = None;
    let mut hops = 0;

    loop {
        let len = *msg.get(pos).ok_or(DecodeSkip::MalformedDns("truncated name"))? as usize;
        match len & 0xc0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                let label = msg
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(DecodeSkip::MalformedDns("truncated label"))?;
                labels.push(String::from_utf8_lossy(label).to_ascii_lowercase());
                pos += 1 + len;
            }
            0xc0 => {
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(DecodeSkip::MalformedDns("compression loop"));
                }
                let target = (be16(msg, pos)? & 0x3fff) as usize;
                resume.get_or_insert(pos + 2);
                pos = target;
            }
            _ => return Err(DecodeSkip::MalformedDns("reserved label type")),
        }
    }

    Ok((labels.join("."), resume.unwrap_or(pos)))
}

/// Extracts every A/AAAA answer of a DNS message; other record types are skipped.
pub fn parse_answers(msg: &[u8]) -> Result<Vec<DnsAnswer>, DecodeSkip> {
    if msg.len() < HEADER_LEN {
        return Err(DecodeSkip::MalformedDns("short header"));
    }
    let questions = be16(msg, 4)?;
    let answers = be16(msg, 6)?;

    let mut pos = HEADER_LEN;
    for _ in 0..questions {
        let (_, next) = read_name(msg, pos)?;
        // qtype + qclass
        pos = next + 4;
    }

    let mut out = Vec::new();
    for _ in 0..answers {
        let (name, next) = read_name(msg, pos)?;
        let rtype = be16(msg, next)?;
        let rdlength = be16(msg, next + 8)? as usize;
        let rdata_start = next + 10;
        let rdata = msg
            .get(rdata_start..rdata_start + rdlength)
            .ok_or(DecodeSkip::MalformedDns("truncated rdata"))?;

        match (rtype, rdata.len()) {
            (TYPE_A, 4) => out.push(DnsAnswer {
                ip: IpAddr::V4(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3])),
                name,
            }),
            (TYPE_AAAA, 16) => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(rdata);
                out.push(DnsAnswer {
                    ip: IpAddr::V6(Ipv6Addr::from(octets)),
                    name,
                });
            }
            (TYPE_A, _) | (TYPE_AAAA, _) => {
                return Err(DecodeSkip::MalformedDns("address of wrong size"))
            }
            _ => {}
        }
        pos = rdata_start + rdlength;
    }

    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn encode_name(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for label in name.split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    /// Response to `name` with one A answer (compressed owner name) and one AAAA answer.
    pub(crate) fn response(name: &str, v4: [u8; 4], v6: Option<[u8; 16]>) -> Vec<u8> {
        let answers: u16 = if v6.is_some() { 2 } else { 1 };
        let mut msg = vec![0x12, 0x34, 0x81, 0x80, 0, 1];
        msg.extend_from_slice(&answers.to_be_bytes());
        msg.extend_from_slice(&[0, 0, 0, 0]);
        msg.extend(encode_name(name));
        msg.extend_from_slice(&[0, 1, 0, 1]);

        msg.extend_from_slice(&[0xc0, 0x0c, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4]);
        msg.extend_from_slice(&v4);
        if let Some(v6) = v6 {
            msg.extend_from_slice(&[0xc0, 0x0c, 0, 28, 0, 1, 0, 0, 0, 60, 0, 16]);
            msg.extend_from_slice(&v6);
        }
        msg
    }

    #[test]
    fn reads_a_and_aaaa_answers() {
        let mut v6 = [0u8; 16];
        v6[0] = 0x2a;
        v6[15] = 1;
        let answers = parse_answers(&response("WWW.Example.org", [93, 184, 216, 34], Some(v6))).unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].name, "www.example.org");
        assert_eq!(answers[0].ip, "93.184.216.34".parse::<IpAddr>().unwrap());
        assert_eq!(answers[1].ip, IpAddr::V6(Ipv6Addr::from(v6)));
    }

    #[test]
    fn skips_other_record_types() {
        let mut msg = vec![0, 0, 0x81, 0x80, 0, 0, 0, 1, 0, 0, 0, 0];
        msg.extend(encode_name("a.com"));
        // CNAME with 2 bytes of rdata
        msg.extend_from_slice(&[0, 5, 0, 1, 0, 0, 0, 60, 0, 2, 0xc0, 0x0c]);
        assert!(parse_answers(&msg).unwrap().is_empty());
    }

    #[test]
    fn pointer_loop_is_malformed() {
        let mut msg = vec![0, 0, 0x81, 0x80, 0, 0, 0, 1, 0, 0, 0, 0];
        msg.extend_from_slice(&[0xc0, 0x0c]);
        assert_eq!(parse_answers(&msg), Err(DecodeSkip::MalformedDns("compression loop")));
    }

    #[test]
    fn truncated_answer_is_malformed() {
        let msg = response("a.com", [1, 2, 3, 4], None);
        assert!(parse_answers(&msg[..msg.len() - 2]).is_err());
    }
}
