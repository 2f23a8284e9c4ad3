use clap::{ArgAction, Parser};
use log::LevelFilter;
use querysniff::analyser::{self, rules::RuleRegistry, tokenize::DeltaTokenizer};
use querysniff::capture::{
    AddressClassifier, ClassificationCache, DomainClassifier, HostClassifier, PacketIngest,
};
use querysniff::config::Config;
use querysniff::ui::output;
use simple_logger::SimpleLogger;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// querysniff infers the shape of a search query from an encrypted packet capture
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// pcap/pcapng file to analyze
    #[arg(short = 'f', long, value_parser)]
    file: PathBuf,

    /// Detection rule to use; all registered rules are tried if omitted
    #[arg(short = 'r', long, value_parser)]
    rule: Option<String>,

    /// Address of the search service (repeatable)
    #[arg(short = 't', long = "target-ip", value_parser)]
    target_ips: Vec<IpAddr>,

    /// Keyword identifying the search service's server names; defaults to the rule name
    #[arg(short = 'd', long, value_parser)]
    target_domain: Option<String>,

    /// JSON file overriding analysis thresholds
    #[arg(short = 'c', long, value_parser)]
    config: Option<PathBuf>,

    /// Longest word the tokenizer will produce
    #[arg(short = 'm', long, value_parser)]
    max_word_len: Option<usize>,

    /// Only output keystroke data
    #[arg(short = 'k', long, action = ArgAction::SetTrue)]
    keystrokes: bool,

    /// Display output as formatted JSON
    #[arg(short = 'j', long, action = ArgAction::SetTrue)]
    json: bool,

    /// Directory to write results to
    #[arg(short = 'o', long, value_parser)]
    output_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(e) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("Cannot install logger: {e}");
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match args.config.as_deref() {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(max_word_len) = args.max_word_len {
        config.max_word_len = max_word_len;
    }

    let out = args.output_dir.as_deref();
    if let Some(out_dir) = out {
        log::info!("Output directory {}", out_dir.display());
        fs::create_dir_all(out_dir)?;
    } else {
        log::warn!("No output directory specified.");
    }

    let registry = RuleRegistry::default();
    let rule = match args.rule.as_deref() {
        Some(name) => Some(registry.get(name).ok_or_else(|| {
            format!("unknown rule '{name}', expected one of {:?}", registry.names())
        })?),
        None => None,
    };

    let address_classifier;
    let domain_classifier;
    let classifier: Option<&dyn HostClassifier> = if !args.target_ips.is_empty() {
        address_classifier = AddressClassifier::new(args.target_ips.iter().copied());
        Some(&address_classifier)
    } else if let Some(keyword) = args.target_domain.as_deref().or(args.rule.as_deref()) {
        domain_classifier = DomainClassifier::new(keyword);
        Some(&domain_classifier)
    } else {
        None
    };

    let mut ingest = PacketIngest::new(&config);
    if let Some(classifier) = classifier {
        ingest = ingest.with_target(classifier);
    }
    let mut cache = ClassificationCache::new();
    let capture = ingest.ingest_file(&args.file, &mut cache)?;

    let tokenizer = DeltaTokenizer {
        space_delta: config.space_delta,
    };
    let session = analyser::core::analyse(&capture, &config, &registry, rule, &tokenizer);

    // ---- Output ----
    if args.keystrokes {
        match out {
            Some(dir) => output::save_keystroke_sequence(&session.keystrokes, &dir.join("keystrokes.json"))?,
            None => println!("{}", serde_json::to_string_pretty(&session.keystrokes)?),
        }
    } else if args.json {
        let json = output::data_as_json(&session)?;
        match out {
            Some(dir) => output::data_to_file(json, &dir.join("search_session.json"))?,
            None => println!("{json}"),
        }
    } else {
        output::print_results(&session);
        if let Some(dir) = out {
            output::save_keystroke_sequence(&session.keystrokes, &dir.join("keystrokes.json"))?;
            write_records(&capture.records, dir)?;
        }
    }

    Ok(())
}

fn write_records(records: &[querysniff::analyser::containers::PacketRecord], dir: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    output::data_to_file(json, &dir.join("records.json"))
}
