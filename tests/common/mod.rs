//! Byte-level builders for synthetic captures.
#![allow(dead_code)]

use std::net::Ipv4Addr;

pub const CLIENT: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);
pub const SEARCH: Ipv4Addr = Ipv4Addr::new(142, 250, 74, 36);
pub const SITE: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);
pub const RESOLVER: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

fn ipv4(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, transport: &[u8]) -> Vec<u8> {
    let total = 20 + transport.len();
    let mut frame = vec![0x02, 0, 0, 0, 0, 1, 0x02, 0, 0, 0, 0, 2, 0x08, 0x00];
    frame.extend_from_slice(&[0x45, 0]);
    frame.extend_from_slice(&(total as u16).to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0x40, 0, 64, protocol, 0, 0]);
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(transport);
    frame
}

pub fn tcp(src: (Ipv4Addr, u16), dst: (Ipv4Addr, u16), payload: &[u8]) -> Vec<u8> {
    let mut segment = Vec::new();
    segment.extend_from_slice(&src.1.to_be_bytes());
    segment.extend_from_slice(&dst.1.to_be_bytes());
    segment.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1]);
    segment.extend_from_slice(&[0x50, 0x18, 0xff, 0xff, 0, 0, 0, 0]);
    segment.extend_from_slice(payload);
    ipv4(src.0, dst.0, 6, &segment)
}

pub fn udp(src: (Ipv4Addr, u16), dst: (Ipv4Addr, u16), payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::new();
    datagram.extend_from_slice(&src.1.to_be_bytes());
    datagram.extend_from_slice(&dst.1.to_be_bytes());
    datagram.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    datagram.extend_from_slice(&[0, 0]);
    datagram.extend_from_slice(payload);
    ipv4(src.0, dst.0, 17, &datagram)
}

pub fn client_hello(sni: &str) -> Vec<u8> {
    let name = sni.as_bytes();
    let mut server_name = Vec::new();
    server_name.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
    server_name.push(0);
    server_name.extend_from_slice(&(name.len() as u16).to_be_bytes());
    server_name.extend_from_slice(name);

    let mut extensions = vec![0, 0];
    extensions.extend_from_slice(&(server_name.len() as u16).to_be_bytes());
    extensions.extend_from_slice(&server_name);

    let mut hello = vec![3, 3];
    hello.extend_from_slice(&[7u8; 32]);
    hello.push(0);
    hello.extend_from_slice(&[0, 2, 0x13, 0x01, 1, 0]);
    hello.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    hello.extend_from_slice(&extensions);

    let mut handshake = vec![1];
    handshake.extend_from_slice(&(hello.len() as u32).to_be_bytes()[1..]);
    handshake.extend_from_slice(&hello);

    let mut record = vec![22, 3, 1];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

pub fn app_data(len: usize) -> Vec<u8> {
    let mut record = vec![23, 3, 3];
    record.extend_from_slice(&(len as u16).to_be_bytes());
    record.extend(std::iter::repeat(0x5a).take(len));
    record
}

/// DNS response for `name` with a single A answer.
pub fn dns_a(name: &str, ip: Ipv4Addr) -> Vec<u8> {
    let mut msg = vec![0xbe, 0xef, 0x81, 0x80, 0, 1, 0, 1, 0, 0, 0, 0];
    for label in name.split('.') {
        msg.push(label.len() as u8);
        msg.extend_from_slice(label.as_bytes());
    }
    msg.push(0);
    msg.extend_from_slice(&[0, 1, 0, 1]);
    msg.extend_from_slice(&[0xc0, 0x0c, 0, 1, 0, 1, 0, 0, 1, 0, 0, 4]);
    msg.extend_from_slice(&ip.octets());
    msg
}

fn block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let padded = (body.len() + 3) / 4 * 4;
    let total = (12 + padded) as u32;
    let mut out = Vec::new();
    out.extend_from_slice(&block_type.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(body);
    out.resize(8 + padded, 0);
    out.extend_from_slice(&total.to_le_bytes());
    out
}

fn pcapng_option(code: u16, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&code.to_le_bytes());
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value);
    out.resize(4 + (value.len() + 3) / 4 * 4, 0);
    out
}

fn pcapng_blocks(interface_options: &[u8], frames: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut shb = Vec::new();
    shb.extend_from_slice(&0x1a2b_3c4d_u32.to_le_bytes());
    shb.extend_from_slice(&1u16.to_le_bytes());
    shb.extend_from_slice(&0u16.to_le_bytes());
    shb.extend_from_slice(&(-1i64).to_le_bytes());
    let mut out = block(0x0a0d_0d0a, &shb);

    let mut idb = Vec::new();
    idb.extend_from_slice(&1u16.to_le_bytes());
    idb.extend_from_slice(&0u16.to_le_bytes());
    idb.extend_from_slice(&65535u32.to_le_bytes());
    idb.extend_from_slice(interface_options);
    out.extend(block(1, &idb));

    for (units, data) in frames {
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_le_bytes());
        epb.extend_from_slice(&((units >> 32) as u32).to_le_bytes());
        epb.extend_from_slice(&(*units as u32).to_le_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_le_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_le_bytes());
        epb.extend_from_slice(data);
        out.extend(block(6, &epb));
    }
    out
}

/// Little-endian pcapng with one Ethernet interface at microsecond resolution.
/// Frames are `(time in ms, bytes)`.
pub fn pcapng(frames: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let frames: Vec<(u64, Vec<u8>)> = frames
        .iter()
        .map(|(time_ms, data)| (time_ms * 1000, data.clone()))
        .collect();
    pcapng_blocks(&[], &frames)
}

/// Like [`pcapng`], but the interface declares `if_tsresol` and `if_tsoffset` (seconds).
/// Frames are `(timestamp in interface units, bytes)`.
pub fn pcapng_with_clock(tsresol: u8, tsoffset_sec: i64, frames: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut options = pcapng_option(9, &[tsresol]);
    options.extend(pcapng_option(14, &tsoffset_sec.to_le_bytes()));
    options.extend(pcapng_option(0, &[]));
    pcapng_blocks(&options, frames)
}

/// Little-endian legacy pcap, Ethernet link type. Frames are `(seconds, sub-seconds, bytes)`
/// where sub-seconds are nanoseconds when `nanosecond` is set, else microseconds.
pub fn legacy_pcap(nanosecond: bool, frames: &[(u32, u32, Vec<u8>)]) -> Vec<u8> {
    let magic: u32 = if nanosecond { 0xa1b2_3c4d } else { 0xa1b2_c3d4 };
    let mut out = Vec::new();
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());

    for (sec, subsec, data) in frames {
        out.extend_from_slice(&sec.to_le_bytes());
        out.extend_from_slice(&subsec.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }
    out
}

pub fn write_capture(dir: &std::path::Path, frames: &[(u64, Vec<u8>)]) -> std::path::PathBuf {
    let path = dir.join("capture.pcapng");
    std::fs::write(&path, pcapng(frames)).unwrap();
    path
}
