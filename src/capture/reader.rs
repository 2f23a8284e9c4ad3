//! Capture-file framing: turns pcapng (or legacy pcap) blocks into timestamped raw frames.
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{create_reader, Block, Linktype, PcapBlockOwned, PcapError};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::CaptureReadError;

const READ_BUFFER: usize = 65536;

/// A link-layer frame as stored in the capture.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFrame {
    pub index: usize,
    pub time_ms: f64,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
struct Interface {
    linktype: Linktype,
    units_per_sec: u64,
    offset_sec: i64,
}

/// Decodes the pcapng `if_tsresol` option into timestamp units per second.
fn units_per_sec(tsresol: u8) -> u64 {
    let exp = u32::from(tsresol & 0x7f);
    if tsresol & 0x80 == 0 {
        10u64.checked_pow(exp).unwrap_or(1_000_000)
    } else {
        1u64.checked_shl(exp).unwrap_or(1_000_000)
    }
}

pub fn read_capture(path: &Path) -> Result<Vec<RawFrame>, CaptureReadError> {
    log::info!("Reading capture {}", path.display());
    let file = File::open(path).map_err(|source| CaptureReadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_frames(file)
}

/// Reads every packet block of a capture, in file order.
pub fn read_frames<R: Read + Send>(input: R) -> Result<Vec<RawFrame>, CaptureReadError> {
    let mut reader = create_reader(READ_BUFFER, input)
        .map_err(|e| CaptureReadError::Framing(format!("{e:?}")))?;

    let mut frames: Vec<RawFrame> = Vec::new();
    let mut interfaces: Vec<Interface> = Vec::new();
    let mut legacy = Interface {
        linktype: Linktype::ETHERNET,
        units_per_sec: 1_000_000,
        offset_sec: 0,
    };

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let frame = match block {
                    PcapBlockOwned::LegacyHeader(hdr) => {
                        legacy.linktype = hdr.network;
                        legacy.units_per_sec = if hdr.is_nanosecond_precision() {
                            1_000_000_000
                        } else {
                            1_000_000
                        };
                        None
                    }
                    PcapBlockOwned::Legacy(pkt) => {
                        let units = u64::from(pkt.ts_sec) * legacy.units_per_sec + u64::from(pkt.ts_usec);
                        let time_ms = units as f64 * 1000.0 / legacy.units_per_sec as f64;
                        Some((legacy.linktype, time_ms, pkt.data.to_vec()))
                    }
                    PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                        interfaces.clear();
                        None
                    }
                    PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                        interfaces.push(Interface {
                            linktype: idb.linktype,
                            units_per_sec: units_per_sec(idb.if_tsresol),
                            offset_sec: idb.if_tsoffset,
                        });
                        None
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                        let iface = interfaces.get(epb.if_id as usize).copied().ok_or_else(|| {
                            CaptureReadError::Framing(format!(
                                "packet references unknown interface {}",
                                epb.if_id
                            ))
                        })?;
                        let units = (u64::from(epb.ts_high) << 32) | u64::from(epb.ts_low);
                        let time_ms = units as f64 * 1000.0 / iface.units_per_sec as f64
                            + iface.offset_sec as f64 * 1000.0;
                        let caplen = (epb.caplen as usize).min(epb.data.len());
                        Some((iface.linktype, time_ms, epb.data[..caplen].to_vec()))
                    }
                    PcapBlockOwned::NG(_) => None,
                };
                reader.consume(offset);

                if let Some((linktype, time_ms, data)) = frame {
                    frames.push(RawFrame {
                        index: frames.len(),
                        time_ms,
                        linktype,
                        data,
                    });
                }
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| CaptureReadError::Framing(format!("refill failed: {e:?}")))?;
            }
            Err(e) => return Err(CaptureReadError::Framing(format!("{e:?}"))),
        }
    }

    log::info!("Read {} frames.", frames.len());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsresol_decoding() {
        assert_eq!(units_per_sec(6), 1_000_000);
        assert_eq!(units_per_sec(9), 1_000_000_000);
        assert_eq!(units_per_sec(0x80 | 10), 1024);
    }

    #[test]
    fn garbage_is_a_framing_error() {
        let garbage: &[u8] = b"definitely not a capture file at all";
        assert!(matches!(read_frames(garbage), Err(CaptureReadError::Framing(_))));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let result = read_capture(Path::new("/nonexistent/capture.pcapng"));
        assert!(matches!(result, Err(CaptureReadError::Open { .. })));
    }
}
