use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Protocol {
    Tcp,
    Udp,
    Other(u8),
}

impl From<u8> for Protocol {
    fn from(number: u8) -> Self {
        match number {
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            other => Protocol::Other(other),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Other(n) => write!(f, "ip-proto-{n}"),
        }
    }
}

/// Direction relative to the target host, if one was given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Unknown,
}

/// One observed packet (or TLS record) of a capture.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PacketRecord {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub frame_time_ms: f64,
    pub frame_length: u32,
    pub protocol: Protocol,
    pub direction: Direction,
}

impl PacketRecord {
    pub fn flow_key(&self) -> FlowKey {
        FlowKey {
            src: self.src,
            dst: self.dst,
            protocol: self.protocol,
        }
    }
}

/// Direction-sensitive conversation identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FlowKey {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub protocol: Protocol,
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.src, self.dst, self.protocol)
    }
}

/// A flow's candidates as parallel arrays, ready for the detector.
#[derive(Clone, Debug)]
pub struct Flow {
    pub key: FlowKey,
    pub records: Vec<PacketRecord>,
    pub lengths: Vec<i64>,
    pub times: Vec<f64>,
}

/// Subsequence of one flow accepted by one detection rule.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeystrokeSequence {
    pub rule: String,
    pub flow: Option<FlowKey>,
    /// Strictly increasing indices into the flow's records.
    pub indices: Vec<usize>,
    pub records: Vec<PacketRecord>,
    /// Length growth between the last two records; `None` below two records.
    pub tail_delta: Option<i64>,
}

impl KeystrokeSequence {
    pub fn empty(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
            flow: None,
            indices: Vec::new(),
            records: Vec::new(),
            tail_delta: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keeps only the positions for which `keep` is true, preserving order.
    pub fn retain_by<F: Fn(&PacketRecord) -> bool>(&mut self, keep: F) {
        let (indices, records): (Vec<usize>, Vec<PacketRecord>) = self
            .indices
            .iter()
            .copied()
            .zip(self.records.drain(..))
            .filter(|(_, record)| keep(record))
            .unzip();
        self.indices = indices;
        self.records = records;
        self.refresh_tail_delta();
    }

    pub fn truncate(&mut self, len: usize) {
        self.indices.truncate(len);
        self.records.truncate(len);
        self.refresh_tail_delta();
    }

    fn refresh_tail_delta(&mut self) {
        self.tail_delta = tail_delta(self.records.iter().map(|r| r.frame_length as i64));
        if self.records.is_empty() {
            self.flow = None;
        }
    }
}

pub(crate) fn tail_delta<I: DoubleEndedIterator<Item = i64>>(lengths: I) -> Option<i64> {
    let mut rev = lengths.rev();
    match (rev.next(), rev.next()) {
        (Some(last), Some(before)) => Some(last - before),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SniSource {
    ClientHello,
    DnsAnswer,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SniEvent {
    pub domain: String,
    pub frame_time_ms: f64,
    pub source: SniSource,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WebsiteVisitGuess {
    pub domain: String,
    pub visit_start_time_ms: f64,
}

/// ip→domain facts; inserts only ever union.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DomainMappings(BTreeSet<(IpAddr, String)>);

impl DomainMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ip: IpAddr, domain: String) -> bool {
        self.0.insert((ip, domain))
    }

    pub fn contains(&self, ip: IpAddr, domain: &str) -> bool {
        self.0.contains(&(ip, domain.to_string()))
    }

    pub fn domains_for(&self, ip: IpAddr) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(move |(mapped, _)| *mapped == ip)
            .map(|(_, domain)| domain.as_str())
    }

    pub fn domain_for(&self, ip: IpAddr) -> Option<&str> {
        self.domains_for(ip).next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(IpAddr, String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(IpAddr, String)> for DomainMappings {
    fn from_iter<T: IntoIterator<Item = (IpAddr, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
