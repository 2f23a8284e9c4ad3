//! Volume-shape heuristics: traffic spikes around the keystroke chain, and website visits
//! inferred from server names and the traffic that follows them.
use serde::Serialize;

use super::containers::{KeystrokeSequence, PacketRecord, SniEvent, SniSource, WebsiteVisitGuess};
use super::utils::{bucket_start, bucket_volumes};
use crate::config::Config;

/// What a single spike boundary did to the keystroke chain.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum SpikeTrim {
    /// The whole chain lies before the spike; later spikes are irrelevant.
    AllBefore { spike_ms: i64 },
    /// The whole chain lies after the spike.
    AllAfter { spike_ms: i64 },
    /// Most of the chain precedes the spike; the tail after it was dropped.
    DroppedBack { spike_ms: i64, removed: usize },
    /// Most of the chain follows the spike; the head before it was dropped.
    DroppedFront { spike_ms: i64, removed: usize },
    /// The spike sits in the middle of the chain; nothing was changed.
    Ambiguous { spike_ms: i64, before: usize, total: usize },
}

/// Start times of windows whose summed volume exceeds the spike threshold, ascending.
pub fn scan_for_spikes(records: &[PacketRecord], config: &Config) -> Vec<i64> {
    bucket_volumes(records, config.spike_bucket_ms)
        .into_iter()
        .filter(|(_, volume)| *volume > config.spike_threshold)
        .map(|(start, _)| start)
        .collect()
}

/// Cuts the keystroke chain at spike boundaries: a page load in the middle of a chain
/// means part of it was not typing.
pub fn trim_at_spikes(
    keystrokes: &mut KeystrokeSequence,
    spikes: &[i64],
    config: &Config,
) -> Vec<SpikeTrim> {
    let mut trims = Vec::new();

    for &spike_ms in spikes {
        let total = keystrokes.len();
        if total == 0 {
            break;
        }
        let is_before = |r: &PacketRecord| r.frame_time_ms <= spike_ms as f64;
        let before = keystrokes.records.iter().filter(|r| is_before(*r)).count();
        let keep_back_above = (config.spike_keep_back_fraction * total as f64).floor() as usize;
        let drop_front_below = (config.spike_drop_front_fraction * total as f64).ceil() as usize;

        if before == total {
            trims.push(SpikeTrim::AllBefore { spike_ms });
            break;
        } else if before == 0 {
            trims.push(SpikeTrim::AllAfter { spike_ms });
        } else if before > keep_back_above {
            keystrokes.retain_by(is_before);
            log::info!(
                "Removed {} potential keystrokes after the spike at {spike_ms}.",
                total - before
            );
            trims.push(SpikeTrim::DroppedBack {
                spike_ms,
                removed: total - before,
            });
            break;
        } else if before < drop_front_below {
            keystrokes.retain_by(|r| !is_before(r));
            log::info!("Removed {before} potential keystrokes before the spike at {spike_ms}.");
            trims.push(SpikeTrim::DroppedFront {
                spike_ms,
                removed: before,
            });
        } else {
            log::warn!(
                "Spike at {spike_ms} in the middle of the keystrokes ({before}/{total} before it); possibly a false detection."
            );
            trims.push(SpikeTrim::Ambiguous {
                spike_ms,
                before,
                total,
            });
        }
    }

    trims
}

/// Guesses website visits: a server name followed by a burst of traffic, at most once per
/// browsing session. A session ends when interesting names stop for longer than the
/// inactivity gap.
///
/// `volume` is the traffic the forward window sums over. The pipeline passes the whole
/// frame-level stream, so requests and responses both count, not only outbound traffic.
/// `min_time_ms` skips everything before the search (typically the last keystroke).
pub fn scan_for_visits(
    volume: &[PacketRecord],
    sni_events: &[SniEvent],
    min_time_ms: f64,
    config: &Config,
) -> Vec<WebsiteVisitGuess> {
    let width = config.visit_bucket_ms;
    let buckets = bucket_volumes(volume, width);
    let Some((&last_bucket, _)) = buckets.iter().next_back() else {
        log::warn!("No traffic to estimate visits from.");
        return Vec::new();
    };
    let capture_end = last_bucket + width as i64;

    let mut guesses: Vec<WebsiteVisitGuess> = Vec::new();
    let mut previous_ms: Option<f64> = None;
    let mut visit_active = false;

    for event in sni_events.iter().filter(|e| e.source == SniSource::ClientHello) {
        if event.frame_time_ms < min_time_ms {
            continue;
        }
        let domain = event.domain.as_str();
        if domain.contains(config.flagged_keyword.as_str()) || !config.is_interesting_domain(domain) {
            continue;
        }

        let from = bucket_start(event.frame_time_ms, width);
        let to = (from + config.forward_window_ms as i64).min(capture_end);
        let forward: u64 = buckets.range(from..to).map(|(_, v)| *v).sum();

        if previous_ms.map_or(true, |p| event.frame_time_ms - p > config.inactivity_gap_ms) {
            visit_active = false;
        }
        if !visit_active && forward > config.visit_threshold {
            log::debug!("Visit to {domain} at {} ({forward} bytes follow).", event.frame_time_ms);
            guesses.push(WebsiteVisitGuess {
                domain: domain.to_string(),
                visit_start_time_ms: event.frame_time_ms,
            });
            visit_active = true;
        }
        previous_ms = Some(event.frame_time_ms);
    }

    guesses
}
