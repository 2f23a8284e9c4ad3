//! Link, network and transport decoding of a single raw frame.
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::Linktype;
use std::net::{IpAddr, SocketAddr};

use super::dns::{self, DnsAnswer};
use super::reader::RawFrame;
use super::tls::{self, TlsSummary};
use crate::analyser::containers::Protocol;
use crate::error::DecodeSkip;

/// What the transport payload turned out to carry.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameContent {
    Tls(TlsSummary),
    Dns(Vec<DnsAnswer>),
    /// Empty payload, or a protocol we do not look into.
    Opaque,
    /// TLS/DNS structure was present but broken; the frame still has valid headers.
    Undecodable(DecodeSkip),
}

/// Header facts of one frame; payload bytes are never kept.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFrame {
    pub index: usize,
    pub time_ms: f64,
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub protocol: Protocol,
    /// IP header plus payload.
    pub ip_length: u32,
    /// Transport header plus payload.
    pub ip_payload_length: u32,
    pub transport_payload_length: u32,
    pub content: FrameContent,
}

pub fn decode_frame(frame: &RawFrame, dns_port: u16) -> Result<DecodedFrame, DecodeSkip> {
    let linktype = frame.linktype;
    let sliced = if linktype == Linktype::ETHERNET {
        SlicedPacket::from_ethernet(&frame.data).map_err(|e| DecodeSkip::Link(e.to_string()))?
    } else if linktype == Linktype::RAW || linktype == Linktype::IPV4 || linktype == Linktype::IPV6 {
        SlicedPacket::from_ip(&frame.data).map_err(|e| DecodeSkip::Link(e.to_string()))?
    } else {
        return Err(DecodeSkip::UnsupportedLink(linktype.0));
    };

    let (src_ip, dst_ip, protocol, ip_length, ip_payload_length) = match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (
                IpAddr::V4(header.source_addr()),
                IpAddr::V4(header.destination_addr()),
                ipv4.payload().ip_number.0,
                u32::from(header.total_len()),
                ipv4.payload().payload.len() as u32,
            )
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            (
                IpAddr::V6(header.source_addr()),
                IpAddr::V6(header.destination_addr()),
                ipv6.payload().ip_number.0,
                40 + u32::from(header.payload_length()),
                ipv6.payload().payload.len() as u32,
            )
        }
        _ => return Err(DecodeSkip::NotIp),
    };

    let (src_port, dst_port, payload, content) = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            let payload = tcp.payload();
            let content = if payload.is_empty() {
                FrameContent::Opaque
            } else {
                match tls::parse_records(payload) {
                    Ok(summary) => FrameContent::Tls(summary),
                    Err(skip) => FrameContent::Undecodable(skip),
                }
            };
            (tcp.source_port(), tcp.destination_port(), payload, content)
        }
        Some(TransportSlice::Udp(udp)) => {
            let payload = udp.payload();
            let content = if udp.source_port() == dns_port {
                match dns::parse_answers(payload) {
                    Ok(answers) => FrameContent::Dns(answers),
                    Err(skip) => FrameContent::Undecodable(skip),
                }
            } else {
                FrameContent::Opaque
            };
            (udp.source_port(), udp.destination_port(), payload, content)
        }
        _ => return Err(DecodeSkip::NoTransport),
    };

    if let FrameContent::Undecodable(skip) = &content {
        log::debug!(
            "Frame {}: {skip} (payload starts {})",
            frame.index,
            hex::encode(&payload[..payload.len().min(8)])
        );
    }

    Ok(DecodedFrame {
        index: frame.index,
        time_ms: frame.time_ms,
        src: SocketAddr::new(src_ip, src_port),
        dst: SocketAddr::new(dst_ip, dst_port),
        protocol: Protocol::from(protocol),
        ip_length,
        ip_payload_length,
        transport_payload_length: payload.len() as u32,
        content,
    })
}
