//! Capture ingestion: framing, header decoding, and the TLS/DNS facts observable without
//! decrypting anything.
pub mod classify;
pub mod decode;
pub mod dns;
pub mod ingest;
pub mod reader;
pub mod tls;

pub use classify::{AddressClassifier, ClassificationCache, DomainClassifier, HostClassifier};
pub use ingest::{Capture, PacketIngest};
pub use reader::{read_capture, read_frames, RawFrame};
