//! Contains utilities and helper functions that aid in record processing.
use std::collections::{BTreeMap, HashMap};

use super::containers::{Flow, FlowKey, PacketRecord};

/// Groups records into per-flow series, dropping records at or below `length_floor`.
///
/// Flows come out in order of first appearance; records keep capture order within a flow.
pub fn group_flows(records: &[PacketRecord], length_floor: u32) -> Vec<Flow> {
    log::info!("Collecting flows.");
    let mut flows: Vec<Flow> = Vec::new();
    let mut slots: HashMap<FlowKey, usize> = HashMap::new();

    for record in records.iter().filter(|r| r.frame_length > length_floor) {
        let key = record.flow_key();
        let slot = *slots.entry(key).or_insert_with(|| {
            flows.push(Flow {
                key,
                records: Vec::new(),
                lengths: Vec::new(),
                times: Vec::new(),
            });
            flows.len() - 1
        });

        let flow = &mut flows[slot];
        flow.lengths.push(record.frame_length as i64);
        flow.times.push(record.frame_time_ms);
        flow.records.push(record.clone());
    }

    log::debug!("{} flows above {} bytes.", flows.len(), length_floor);
    flows
}

/// Start of the fixed-width window containing `time_ms`.
pub fn bucket_start(time_ms: f64, width_ms: f64) -> i64 {
    ((time_ms / width_ms).floor() * width_ms) as i64
}

/// Sums record lengths per fixed-width time window, keyed by window start.
pub fn bucket_volumes(records: &[PacketRecord], width_ms: f64) -> BTreeMap<i64, u64> {
    let mut volumes: BTreeMap<i64, u64> = BTreeMap::new();
    for record in records {
        *volumes.entry(bucket_start(record.frame_time_ms, width_ms)).or_default() +=
            u64::from(record.frame_length);
    }
    volumes
}
