//! Keystroke sequence detection and the search-session analysis built on top of it.
use serde::Serialize;
use std::cmp::Ordering;
use std::net::{IpAddr, SocketAddr};

use super::containers::{
    tail_delta, DomainMappings, Flow, KeystrokeSequence, WebsiteVisitGuess,
};
use super::rules::{DetectionRule, RuleRegistry};
use super::scan::{scan_for_spikes, scan_for_visits, trim_at_spikes, SpikeTrim};
use super::tokenize::{query_pattern, word_lengths, WordTokenizer};
use super::utils::group_flows;
use crate::capture::Capture;
use crate::config::Config;

/// Longest chain of indices `i1 < i2 < ... < ik` such that every element is admissible
/// after the chain before it. Returns the chain and its final length step.
///
/// This is a longest-increasing-subsequence search with `rule` in place of `<`: for each
/// `i`, every earlier chain `j` that admits `lengths[i]` is a candidate prefix, and the
/// longest one wins (earliest `j` on ties). Among the chains ending at each index, the
/// longest is returned; equal lengths prefer the smaller final step, then the earlier end.
pub fn longest_sequence(
    lengths: &[i64],
    times: &[f64],
    rule: &dyn DetectionRule,
) -> (Vec<usize>, Option<i64>) {
    assert_eq!(lengths.len(), times.len());
    let n = lengths.len();
    let mut chains: Vec<Vec<usize>> = Vec::with_capacity(n);
    let mut chain_lengths: Vec<Vec<i64>> = Vec::with_capacity(n);

    for i in 0..n {
        let mut prefix: Option<usize> = None;
        for j in 0..i {
            let accepted = &chain_lengths[j];
            let admissible = rule.accept(
                accepted,
                lengths[i],
                times[chains[j][0]],
                times[i],
                times[j],
            );
            if admissible && prefix.map_or(true, |p| chains[j].len() > chains[p].len()) {
                prefix = Some(j);
            }
        }

        let (mut chain, mut values) = match prefix {
            Some(p) => (chains[p].clone(), chain_lengths[p].clone()),
            None => (Vec::new(), Vec::new()),
        };
        chain.push(i);
        values.push(lengths[i]);
        chains.push(chain);
        chain_lengths.push(values);
    }

    let mut best: Option<(usize, Option<i64>)> = None;
    for (i, values) in chain_lengths.iter().enumerate() {
        let delta = tail_delta(values.iter().copied());
        let better = match best {
            None => true,
            Some((b, b_delta)) => {
                values.len() > chains[b].len()
                    || (values.len() == chains[b].len() && step_rank(delta) < step_rank(b_delta))
            }
        };
        if better {
            best = Some((i, delta));
        }
    }

    match best {
        Some((i, delta)) => (chains.swap_remove(i), delta),
        None => (Vec::new(), None),
    }
}

/// Single-element chains have no step and rank last.
fn step_rank(delta: Option<i64>) -> i64 {
    delta.unwrap_or(i64::MAX)
}

/// Total order of candidate chains: longer first, then tighter final step, then the
/// flow that appeared first in the capture.
fn rank(a: &(usize, KeystrokeSequence), b: &(usize, KeystrokeSequence)) -> Ordering {
    b.1.len()
        .cmp(&a.1.len())
        .then(step_rank(a.1.tail_delta).cmp(&step_rank(b.1.tail_delta)))
        .then(a.0.cmp(&b.0))
}

/// Best chain of a single flow under `rule`.
pub fn detect_in_flow(flow: &Flow, rule: &dyn DetectionRule) -> KeystrokeSequence {
    let (indices, tail_delta) = longest_sequence(&flow.lengths, &flow.times, rule);
    if indices.is_empty() {
        return KeystrokeSequence::empty(rule.name());
    }
    KeystrokeSequence {
        rule: rule.name().to_string(),
        flow: Some(flow.key),
        records: indices.iter().map(|&i| flow.records[i].clone()).collect(),
        indices,
        tail_delta,
    }
}

/// Best chain across all flows under `rule`, after the rule's tail trimming.
///
/// Flows are independent; the reduction is a total order, so the outcome does not depend
/// on the order in which per-flow results are produced.
pub fn detect_keystrokes(flows: &[Flow], rule: &dyn DetectionRule) -> KeystrokeSequence {
    let best = flows
        .iter()
        .enumerate()
        .map(|(ordinal, flow)| (ordinal, detect_in_flow(flow, rule)))
        .min_by(rank);

    let Some((_, mut sequence)) = best else {
        return KeystrokeSequence::empty(rule.name());
    };
    let lengths: Vec<i64> = sequence.records.iter().map(|r| r.frame_length as i64).collect();
    let keep = rule.trim_tail(&lengths);
    if keep < sequence.len() {
        log::debug!("Rule {} dropped {} trailing record(s).", rule.name(), sequence.len() - keep);
        sequence.truncate(keep);
    }
    sequence
}

/// Tries every registered rule and keeps the longest result; ties go to the rule
/// registered first in name order.
pub fn detect_any_rule(flows: &[Flow], registry: &RuleRegistry) -> KeystrokeSequence {
    let mut best: Option<KeystrokeSequence> = None;
    for rule in registry.iter() {
        let sequence = detect_keystrokes(flows, rule);
        log::debug!("Rule {} found {} keystrokes.", rule.name(), sequence.len());
        if best.as_ref().map_or(true, |b| sequence.len() > b.len()) {
            best = Some(sequence);
        }
    }
    best.unwrap_or_else(|| KeystrokeSequence::empty(""))
}

/// Everything inferred about one search session.
#[derive(Clone, Debug, Serialize)]
pub struct SearchSession {
    pub keystrokes: KeystrokeSequence,
    pub spike_trims: Vec<SpikeTrim>,
    pub tokens: Vec<usize>,
    pub word_lengths: Vec<i64>,
    pub query_pattern: String,
    pub latest_keystroke_ms: Option<f64>,
    pub search_endpoint: Option<SocketAddr>,
    pub last_sni_domain: Option<String>,
    pub max_frame_length: Option<u32>,
    pub visits: Vec<WebsiteVisitGuess>,
    pub interesting_mappings: DomainMappings,
    pub unrecognised_ips: Vec<IpAddr>,
}

/// Runs detection, spike trimming, tokenization and visit guessing over an ingested
/// capture. With `rule` unset every registered rule is tried.
pub fn analyse(
    capture: &Capture,
    config: &Config,
    registry: &RuleRegistry,
    rule: Option<&dyn DetectionRule>,
    tokenizer: &dyn WordTokenizer,
) -> SearchSession {
    log::info!("Starting analysis.");

    let flows = group_flows(&capture.outgoing, config.length_floor);
    let mut keystrokes = match rule {
        Some(rule) => detect_keystrokes(&flows, rule),
        None => detect_any_rule(&flows, registry),
    };
    log::info!(
        "Detected {} keystrokes with rule '{}'.",
        keystrokes.len(),
        keystrokes.rule
    );

    let spikes = scan_for_spikes(&capture.incoming, config);
    let spike_trims = trim_at_spikes(&mut keystrokes, &spikes, config);

    let tokens = tokenizer.tokenize(&keystrokes.records, &keystrokes.rule, config.max_word_len);
    let word_lengths = word_lengths(&tokens);
    let query_pattern = query_pattern(&word_lengths);

    let latest_keystroke_ms = keystrokes
        .records
        .iter()
        .map(|r| r.frame_time_ms)
        .reduce(f64::max);
    let min_time = latest_keystroke_ms.unwrap_or(f64::NEG_INFINITY);
    let last_sni_domain = capture
        .last_sni_before(latest_keystroke_ms.unwrap_or(f64::INFINITY))
        .map(|e| e.domain.clone());

    let visits = scan_for_visits(&capture.records, &capture.sni_events, min_time, config);
    log::info!("Guessed {} website visits.", visits.len());

    SearchSession {
        search_endpoint: keystrokes.flow.map(|f| f.dst),
        max_frame_length: keystrokes.records.iter().map(|r| r.frame_length).max(),
        keystrokes,
        spike_trims,
        tokens,
        word_lengths,
        query_pattern,
        latest_keystroke_ms,
        last_sni_domain,
        visits,
        interesting_mappings: capture.interesting_mappings(config, min_time),
        unrecognised_ips: capture.unrecognised_ips(config, min_time),
    }
}
