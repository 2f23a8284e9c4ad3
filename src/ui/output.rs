use crate::analyser::containers::KeystrokeSequence;
use crate::analyser::core::SearchSession;
use crate::analyser::scan::SpikeTrim;
use ansi_term::Colour;
use chrono::DateTime;
use std::fs;
use std::path::Path;

/// Capture timestamps are epoch milliseconds; anything else is shown raw.
fn format_time(ms: f64) -> String {
    match DateTime::from_timestamp_millis(ms as i64) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{ms:.3}"),
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn print_results(session: &SearchSession) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Results");
    print_core(session);
    print_keystrokes(&session.keystrokes);
    print_visits(session);
}

pub fn print_core(session: &SearchSession) {
    println!("\u{2503}");
    println!("\u{2503} Rule             : {}", Colour::Red.paint(&session.keystrokes.rule));
    println!("\u{2503} Word lengths     : {}", Colour::Fixed(226).paint(format!("{:?}", session.word_lengths)));
    println!("\u{2503} Pattern          : {}", Colour::Fixed(226).paint(&session.query_pattern));
    println!("\u{2503} Search endpoint  : {}", Colour::Fixed(226).paint(or_dash(session.search_endpoint)));
    println!("\u{2503} Last SNI         : {}", Colour::Fixed(226).paint(or_dash(session.last_sni_domain.as_deref())));
    println!("\u{2503} Max length       : {}", Colour::Fixed(226).paint(or_dash(session.max_frame_length)));
    println!(
        "\u{2503} Last keystroke   : {}",
        Colour::Fixed(226).paint(or_dash(session.latest_keystroke_ms.map(format_time)))
    );
    for trim in &session.spike_trims {
        if let SpikeTrim::Ambiguous { spike_ms, before, total } = trim {
            println!(
                "\u{2503} {}",
                Colour::Yellow.paint(format!(
                    "Spike at {} splits the keystrokes {before}/{total}",
                    format_time(*spike_ms as f64)
                ))
            );
        }
    }
    println!("\u{2503} ");
}

pub fn print_keystrokes(keystrokes: &KeystrokeSequence) {
    println!("\u{2523}\u{2501}\u{2501} Keystrokes ({})", keystrokes.len());
    for record in &keystrokes.records {
        println!(
            "\u{2503} {}  {:>6}  {} -> {}",
            format_time(record.frame_time_ms),
            Colour::Green.paint(record.frame_length.to_string()),
            record.src,
            record.dst
        );
    }
    println!("\u{2503} ");
}

pub fn print_visits(session: &SearchSession) {
    println!("\u{2523}\u{2501}\u{2501} Website visits ({})", session.visits.len());
    for visit in &session.visits {
        println!(
            "\u{2503} {}  {}",
            format_time(visit.visit_start_time_ms),
            Colour::Cyan.paint(&visit.domain)
        );
    }
    if !session.unrecognised_ips.is_empty() {
        let ips: Vec<String> = session.unrecognised_ips.iter().map(|ip| ip.to_string()).collect();
        println!("\u{2503} Unrecognised     : {}", ips.join(", "));
    }
    println!("\u{2517}");
}

pub fn data_as_json(session: &SearchSession) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(session)
}

pub fn data_to_file(data: String, path: &Path) -> std::io::Result<()> {
    log::info!("Writing {}", path.display());
    fs::write(path, data)
}

pub fn save_keystroke_sequence(keystrokes: &KeystrokeSequence, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(keystrokes)?;
    data_to_file(json, path)
}
