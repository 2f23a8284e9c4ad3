//! Tunable thresholds for the analysis stages.
//!
//! All values were tuned empirically against search-engine traffic; they are defaults,
//! not invariants. A JSON file may override any subset of them.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Infrastructure hosts that never count as a user-visible website.
pub const DEFAULT_DENY_LIST: &[&str] = &[
    "cdn",
    "static",
    "doubleclick",
    "api.",
    "cloudfront",
    "map.fastly.net",
    "googleapis.com",
    "code.jquery.com",
    "hit.gemius.pl",
    "akamaiedge.net",
    "dropbox.com",
    "hotjar.com",
    "opera.com",
    "s.section.io",
    "adobess.com",
    "omtrdc.net",
    "demdex.net",
    "adservice.google",
    "global.fastly.net",
    "hello.myfonts.net",
    "adobedtm.com",
    "ping.chartbeat.net",
    "drive.google.com",
    "resources.jetbrains.com",
    "js-agent.newrelic.com",
    "googletagmanager.com",
    "stackstorage.com",
    "mail.me.com",
    "ytimg.com",
    "mozilla.cloudflare-dns.com",
    "services.mozilla.com",
    "telemetry.mozilla.org",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Records at or below this length are never keystroke candidates (smallest GET request).
    pub length_floor: u32,

    pub spike_bucket_ms: f64,
    pub spike_threshold: u64,
    /// More than this share of the chain before a spike keeps only the front.
    pub spike_keep_back_fraction: f64,
    /// Less than this share of the chain before a spike drops the front.
    pub spike_drop_front_fraction: f64,

    pub visit_bucket_ms: f64,
    pub visit_threshold: u64,
    pub forward_window_ms: f64,
    pub inactivity_gap_ms: f64,
    /// SNI domains containing this keyword are the search engine itself, never a visit.
    pub flagged_keyword: String,
    pub deny_list: Vec<String>,

    /// Minimum IP length of a TCP frame that counts as bulk transfer to or from a host.
    pub bulk_packet_floor: u32,
    pub tls_port: u16,
    pub dns_port: u16,

    pub max_word_len: usize,
    /// Length growth of the request carrying a typed space ("%20").
    pub space_delta: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            length_floor: 100,
            spike_bucket_ms: 500.0,
            spike_threshold: 100_000,
            spike_keep_back_fraction: 2.0 / 3.0,
            spike_drop_front_fraction: 1.0 / 3.0,
            visit_bucket_ms: 1000.0,
            visit_threshold: 50_000,
            forward_window_ms: 4000.0,
            inactivity_gap_ms: 3000.0,
            flagged_keyword: String::from("google"),
            deny_list: DEFAULT_DENY_LIST.iter().map(|s| s.to_string()).collect(),
            bulk_packet_floor: 1240,
            tls_port: 443,
            dns_port: 53,
            max_word_len: 20,
            space_delta: 3,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading configuration from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// A domain is interesting when it matches none of the deny-list keywords.
    pub fn is_interesting_domain(&self, domain: &str) -> bool {
        !self.deny_list.iter().any(|keyword| domain.contains(keyword.as_str()))
    }
}
