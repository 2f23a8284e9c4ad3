//! PacketIngest: turns raw frames into typed packet records, SNI events and ip→domain facts.
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::Path;

use super::classify::{ClassificationCache, HostClassifier};
use super::decode::{decode_frame, DecodedFrame, FrameContent};
use super::reader::{read_capture, RawFrame};
use crate::analyser::containers::{
    Direction, DomainMappings, PacketRecord, Protocol, SniEvent, SniSource,
};
use crate::config::Config;
use crate::error::CaptureReadError;

/// A TCP frame large enough to be bulk transfer rather than control traffic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BulkSighting {
    pub frame_time_ms: f64,
    pub src: IpAddr,
    pub dst: IpAddr,
}

/// Everything learned from one capture. All sequences are in capture order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Capture {
    /// Frames carrying parseable TLS or DNS responses; length is the IP payload length.
    pub records: Vec<PacketRecord>,
    /// Keystroke candidates: one per TLS application-data record sent to the target.
    pub outgoing: Vec<PacketRecord>,
    /// Non-empty TCP segments sent by the target's TLS port.
    pub incoming: Vec<PacketRecord>,
    pub sni_events: Vec<SniEvent>,
    pub mappings: DomainMappings,
    pub tcp_hosts: BTreeSet<IpAddr>,
    pub bulk: Vec<BulkSighting>,
    /// Frames dropped before or during header decoding.
    pub skipped: usize,
}

impl Capture {
    fn bulk_hosts(&self, min_time_ms: f64) -> BTreeSet<IpAddr> {
        self.bulk
            .iter()
            .filter(|b| b.frame_time_ms > min_time_ms)
            .flat_map(|b| [b.src, b.dst])
            .collect()
    }

    /// ip→domain facts of hosts that moved bulk data after `min_time_ms`, minus
    /// infrastructure domains.
    pub fn interesting_mappings(&self, config: &Config, min_time_ms: f64) -> DomainMappings {
        let bulk = self.bulk_hosts(min_time_ms);
        self.mappings
            .iter()
            .filter(|(ip, domain)| bulk.contains(ip) && config.is_interesting_domain(domain))
            .cloned()
            .collect()
    }

    /// Bulk-transfer hosts after `min_time_ms` for which no interesting name is known.
    pub fn unrecognised_ips(&self, config: &Config, min_time_ms: f64) -> Vec<IpAddr> {
        let bulk = self.bulk_hosts(min_time_ms);
        let known = self.interesting_mappings(config, min_time_ms);
        let infrastructure: BTreeSet<IpAddr> = self
            .mappings
            .iter()
            .filter(|(_, domain)| !config.is_interesting_domain(domain))
            .map(|(ip, _)| *ip)
            .collect();

        self.tcp_hosts
            .iter()
            .filter(|ip| bulk.contains(ip) && !infrastructure.contains(ip))
            .filter(|ip| known.domain_for(**ip).is_none())
            .copied()
            .collect()
    }

    /// The last ClientHello server name seen at or before `time_ms`.
    pub fn last_sni_before(&self, time_ms: f64) -> Option<&SniEvent> {
        self.sni_events
            .iter()
            .filter(|e| e.source == SniSource::ClientHello && e.frame_time_ms <= time_ms)
            .last()
    }
}

pub struct PacketIngest<'a> {
    config: &'a Config,
    classifier: Option<&'a dyn HostClassifier>,
}

impl<'a> PacketIngest<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            classifier: None,
        }
    }

    /// Splits keystroke candidates into outgoing/incoming relative to the classified target.
    pub fn with_target(mut self, classifier: &'a dyn HostClassifier) -> Self {
        log::info!("Target hosts: {}", classifier.describe());
        self.classifier = Some(classifier);
        self
    }

    pub fn ingest_file(
        &self,
        path: &Path,
        cache: &mut ClassificationCache,
    ) -> Result<Capture, CaptureReadError> {
        let frames = read_capture(path)?;
        Ok(self.ingest_frames(&frames, cache))
    }

    pub fn ingest_frames(&self, frames: &[RawFrame], cache: &mut ClassificationCache) -> Capture {
        log::info!("Decoding {} frames.", frames.len());
        let mut capture = Capture::default();

        let decoded: Vec<DecodedFrame> = frames
            .iter()
            .filter_map(|frame| match decode_frame(frame, self.config.dns_port) {
                Ok(decoded) => Some(decoded),
                Err(skip) => {
                    log::debug!("Skipping frame {}: {skip}", frame.index);
                    capture.skipped += 1;
                    None
                }
            })
            .collect();

        // Names first: target classification may depend on them.
        for frame in &decoded {
            self.collect_names(frame, &mut capture);
        }

        for frame in &decoded {
            let direction = self.direction(frame, &capture.mappings, cache);

            if matches!(frame.content, FrameContent::Tls(_) | FrameContent::Dns(_)) {
                capture.records.push(self.record(frame, frame.ip_payload_length, direction));
            }

            if frame.protocol != Protocol::Tcp {
                continue;
            }
            capture.tcp_hosts.insert(frame.src.ip());
            capture.tcp_hosts.insert(frame.dst.ip());
            if frame.ip_length >= self.config.bulk_packet_floor {
                capture.bulk.push(BulkSighting {
                    frame_time_ms: frame.time_ms,
                    src: frame.src.ip(),
                    dst: frame.dst.ip(),
                });
            }

            self.collect_candidates(frame, direction, &mut capture);
        }

        log::info!(
            "Ingested {} records, {} outgoing / {} incoming candidates, {} names, {} skipped frames.",
            capture.records.len(),
            capture.outgoing.len(),
            capture.incoming.len(),
            capture.mappings.len(),
            capture.skipped
        );
        capture
    }

    fn collect_names(&self, frame: &DecodedFrame, capture: &mut Capture) {
        match &frame.content {
            FrameContent::Tls(summary) => {
                if let Some(sni) = &summary.sni {
                    capture.mappings.insert(frame.dst.ip(), sni.clone());
                    capture.sni_events.push(SniEvent {
                        domain: sni.clone(),
                        frame_time_ms: frame.time_ms,
                        source: SniSource::ClientHello,
                    });
                }
            }
            FrameContent::Dns(answers) => {
                for answer in answers {
                    capture.mappings.insert(answer.ip, answer.name.clone());
                    capture.sni_events.push(SniEvent {
                        domain: answer.name.clone(),
                        frame_time_ms: frame.time_ms,
                        source: SniSource::DnsAnswer,
                    });
                }
            }
            FrameContent::Opaque | FrameContent::Undecodable(_) => {}
        }
    }

    fn direction(
        &self,
        frame: &DecodedFrame,
        mappings: &DomainMappings,
        cache: &mut ClassificationCache,
    ) -> Direction {
        let Some(classifier) = self.classifier else {
            return Direction::Unknown;
        };
        if cache.is_target(classifier, frame.dst.ip(), mappings) {
            Direction::Outgoing
        } else if cache.is_target(classifier, frame.src.ip(), mappings) {
            Direction::Incoming
        } else {
            Direction::Unknown
        }
    }

    fn collect_candidates(&self, frame: &DecodedFrame, direction: Direction, capture: &mut Capture) {
        if frame.transport_payload_length == 0 {
            return;
        }
        let tls_port = self.config.tls_port;

        match direction {
            Direction::Incoming if frame.src.port() == tls_port => {
                capture
                    .incoming
                    .push(self.record(frame, frame.transport_payload_length, direction));
            }
            Direction::Incoming => {}
            Direction::Unknown if self.classifier.is_some() => {}
            Direction::Outgoing | Direction::Unknown => {
                if frame.dst.port() != tls_port {
                    return;
                }
                if let FrameContent::Tls(summary) = &frame.content {
                    for app_data in summary.application_data() {
                        capture.outgoing.push(self.record(frame, app_data.length, direction));
                    }
                }
            }
        }
    }

    fn record(&self, frame: &DecodedFrame, frame_length: u32, direction: Direction) -> PacketRecord {
        PacketRecord {
            src: frame.src,
            dst: frame.dst,
            frame_time_ms: frame.time_ms,
            frame_length,
            protocol: frame.protocol,
            direction,
        }
    }
}
