mod common;

use common::*;
use querysniff::analyser::containers::{Direction, SniSource};
use querysniff::analyser::core::analyse;
use querysniff::analyser::rules::RuleRegistry;
use querysniff::analyser::tokenize::DeltaTokenizer;
use querysniff::capture::{read_frames, ClassificationCache, DomainClassifier, PacketIngest};
use querysniff::config::Config;
use querysniff::error::CaptureReadError;
use std::net::{IpAddr, SocketAddr};

const EPHEMERAL: u16 = 51000;

fn search_capture() -> Vec<(u64, Vec<u8>)> {
    let mut frames = vec![
        (900, udp((RESOLVER, 53), (CLIENT, 40000), &dns_a("www.google.com", SEARCH))),
        (950, tcp((CLIENT, EPHEMERAL), (SEARCH, 443), &client_hello("www.google.com"))),
    ];
    for (i, len) in [400usize, 401, 402, 403].iter().enumerate() {
        let t = 1000 + 300 * i as u64;
        frames.push((t, tcp((CLIENT, EPHEMERAL), (SEARCH, 443), &app_data(*len))));
        frames.push((t + 40, tcp((SEARCH, 443), (CLIENT, EPHEMERAL), &app_data(600))));
    }
    frames.push((3000, tcp((CLIENT, 52000), (SITE, 443), &client_hello("example.org"))));
    for i in 0..40u64 {
        frames.push((3000 + 20 * i, tcp((SITE, 443), (CLIENT, 52000), &app_data(1400))));
    }
    frames
}

#[test]
fn client_hello_yields_mapping_and_malformed_tls_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let broken = [22u8, 3, 1, 0, 6, 1, 0, 0, 200, 3, 3];
    let path = write_capture(
        dir.path(),
        &[
            (1000, tcp((CLIENT, EPHEMERAL), (SITE, 443), &client_hello("example.com"))),
            (1100, tcp((CLIENT, EPHEMERAL), (SITE, 443), &broken)),
            (1200, tcp((CLIENT, EPHEMERAL), (SITE, 443), &app_data(300))),
            (1300, udp((RESOLVER, 53), (CLIENT, 40000), &dns_a("Example.net", SEARCH))),
        ],
    );

    let config = Config::default();
    let mut cache = ClassificationCache::new();
    let capture = PacketIngest::new(&config).ingest_file(&path, &mut cache).unwrap();

    assert!(capture.mappings.contains(IpAddr::V4(SITE), "example.com"));
    assert!(capture.mappings.contains(IpAddr::V4(SEARCH), "example.net"));
    assert_eq!(capture.mappings.len(), 2);

    // ClientHello, app data, DNS; the broken record contributes nothing.
    let times: Vec<f64> = capture.records.iter().map(|r| r.frame_time_ms).collect();
    assert_eq!(times, vec![1000.0, 1200.0, 1300.0]);
    assert_eq!(capture.outgoing.len(), 1);
    assert_eq!(capture.outgoing[0].frame_length, 300);
    assert_eq!(capture.outgoing[0].direction, Direction::Unknown);

    assert_eq!(capture.sni_events.len(), 2);
    assert_eq!(capture.sni_events[0].domain, "example.com");
    assert_eq!(capture.sni_events[0].source, SniSource::ClientHello);
    assert_eq!(capture.sni_events[1].source, SniSource::DnsAnswer);
}

#[test]
fn ingest_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(dir.path(), &search_capture());
    let config = Config::default();
    let classifier = DomainClassifier::new("google");
    let ingest = PacketIngest::new(&config).with_target(&classifier);

    let first = ingest.ingest_file(&path, &mut ClassificationCache::new()).unwrap();
    let second = ingest.ingest_file(&path, &mut ClassificationCache::new()).unwrap();
    assert_eq!(first, second);
    assert!(!first.records.is_empty());
}

#[test]
fn target_classification_splits_directions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(dir.path(), &search_capture());
    let config = Config::default();
    let classifier = DomainClassifier::new("google");
    let mut cache = ClassificationCache::new();
    let capture = PacketIngest::new(&config)
        .with_target(&classifier)
        .ingest_file(&path, &mut cache)
        .unwrap();

    let outgoing: Vec<u32> = capture.outgoing.iter().map(|r| r.frame_length).collect();
    assert_eq!(outgoing, vec![400, 401, 402, 403]);
    assert!(capture.outgoing.iter().all(|r| r.direction == Direction::Outgoing));
    assert_eq!(capture.incoming.len(), 4);
    assert!(capture.incoming.iter().all(|r| r.frame_length == 605));
    assert!(cache.len() >= 3);
}

#[test]
fn search_session_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(dir.path(), &search_capture());
    let config = Config::default();
    let classifier = DomainClassifier::new("google");
    let capture = PacketIngest::new(&config)
        .with_target(&classifier)
        .ingest_file(&path, &mut ClassificationCache::new())
        .unwrap();

    let registry = RuleRegistry::default();
    let tokenizer = DeltaTokenizer { space_delta: config.space_delta };
    let session = analyse(&capture, &config, &registry, registry.get("google"), &tokenizer);

    assert_eq!(session.keystrokes.rule, "google");
    assert_eq!(session.keystrokes.len(), 4);
    assert_eq!(session.word_lengths, vec![4]);
    assert_eq!(session.query_pattern, r"[\w-]{4}");
    assert_eq!(session.latest_keystroke_ms, Some(1900.0));
    assert_eq!(session.max_frame_length, Some(403));
    assert_eq!(session.search_endpoint, Some(SocketAddr::new(IpAddr::V4(SEARCH), 443)));
    assert_eq!(session.last_sni_domain.as_deref(), Some("www.google.com"));
    assert!(session.spike_trims.is_empty());

    assert_eq!(session.visits.len(), 1);
    assert_eq!(session.visits[0].domain, "example.org");
    assert_eq!(session.visits[0].visit_start_time_ms, 3000.0);

    assert!(session.interesting_mappings.contains(IpAddr::V4(SITE), "example.org"));
    // The client moved the same bulk data but has no name of its own.
    assert_eq!(session.unrecognised_ips, vec![IpAddr::V4(CLIENT)]);
}

#[test]
fn unreadable_capture_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pcapng");
    std::fs::write(&path, b"this is not a capture file, not even close").unwrap();
    let config = Config::default();
    let result = PacketIngest::new(&config).ingest_file(&path, &mut ClassificationCache::new());
    assert!(matches!(result, Err(CaptureReadError::Framing(_))));
}

fn frame_times(bytes: &[u8]) -> Vec<f64> {
    read_frames(bytes).unwrap().iter().map(|f| f.time_ms).collect()
}

#[test]
fn pcapng_interface_resolution_and_offset() {
    let frame = tcp((CLIENT, EPHEMERAL), (SITE, 443), &app_data(300));

    // Millisecond units, shifted by a whole epoch offset.
    let millis = pcapng_with_clock(3, 1_600_000_000, &[(1500, frame.clone())]);
    assert_eq!(frame_times(&millis), vec![1_600_000_001_500.0]);

    // Power-of-two resolution: 1024 units per second.
    let binary = pcapng_with_clock(0x80 | 10, 0, &[(2048, frame.clone()), (3072, frame)]);
    assert_eq!(frame_times(&binary), vec![2000.0, 3000.0]);
}

#[test]
fn legacy_pcap_timestamps() {
    let frame = tcp((CLIENT, EPHEMERAL), (SITE, 443), &app_data(300));

    let micros = legacy_pcap(false, &[(2, 250_000, frame.clone())]);
    assert_eq!(frame_times(&micros), vec![2250.0]);

    let nanos = legacy_pcap(true, &[(1, 500_000_000, frame)]);
    assert_eq!(frame_times(&nanos), vec![1500.0]);
}

#[test]
fn legacy_pcap_ingests_like_pcapng() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.pcap");
    let frames = vec![
        (1, 0, tcp((CLIENT, EPHEMERAL), (SITE, 443), &client_hello("example.com"))),
        (1, 400_000, tcp((CLIENT, EPHEMERAL), (SITE, 443), &app_data(300))),
    ];
    std::fs::write(&path, legacy_pcap(false, &frames)).unwrap();

    let config = Config::default();
    let capture = PacketIngest::new(&config)
        .ingest_file(&path, &mut ClassificationCache::new())
        .unwrap();

    assert!(capture.mappings.contains(IpAddr::V4(SITE), "example.com"));
    let times: Vec<f64> = capture.records.iter().map(|r| r.frame_time_ms).collect();
    assert_eq!(times, vec![1000.0, 1400.0]);
    assert_eq!(capture.outgoing.len(), 1);
    assert_eq!(capture.outgoing[0].frame_time_ms, 1400.0);
}
