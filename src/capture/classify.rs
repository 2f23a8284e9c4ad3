//! Deciding whether an address belongs to the target service (e.g. the search engine).
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::analyser::containers::DomainMappings;

/// Target-host capability. Implementations may consult the capture's ip→domain facts.
pub trait HostClassifier {
    fn is_target(&self, ip: IpAddr, mappings: &DomainMappings) -> bool;

    fn describe(&self) -> String;
}

/// Fixed set of target addresses.
pub struct AddressClassifier {
    addresses: HashSet<IpAddr>,
}

impl AddressClassifier {
    pub fn new<I: IntoIterator<Item = IpAddr>>(addresses: I) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }
}

impl HostClassifier for AddressClassifier {
    fn is_target(&self, ip: IpAddr, _mappings: &DomainMappings) -> bool {
        self.addresses.contains(&ip)
    }

    fn describe(&self) -> String {
        format!("{} fixed address(es)", self.addresses.len())
    }
}

/// Addresses whose SNI/DNS-derived name contains a keyword.
pub struct DomainClassifier {
    keyword: String,
}

impl DomainClassifier {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_ascii_lowercase(),
        }
    }
}

impl HostClassifier for DomainClassifier {
    fn is_target(&self, ip: IpAddr, mappings: &DomainMappings) -> bool {
        mappings.domains_for(ip).any(|d| d.contains(self.keyword.as_str()))
    }

    fn describe(&self) -> String {
        format!("domains containing '{}'", self.keyword)
    }
}

/// Memoized classifier verdicts. Owned by the caller; reuse it across ingests of
/// captures that share the same mappings, drop it when they no longer apply.
#[derive(Debug, Default)]
pub struct ClassificationCache {
    verdicts: HashMap<IpAddr, bool>,
    misses: usize,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_target(
        &mut self,
        classifier: &dyn HostClassifier,
        ip: IpAddr,
        mappings: &DomainMappings,
    ) -> bool {
        if let Some(verdict) = self.verdicts.get(&ip) {
            return *verdict;
        }
        self.misses += 1;
        let verdict = classifier.is_target(ip, mappings);
        self.verdicts.insert(ip, verdict);
        verdict
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Number of lookups that had to consult the classifier.
    pub fn misses(&self) -> usize {
        self.misses
    }
}
