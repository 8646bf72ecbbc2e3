//! FraudSynth CLI - synthetic payment fraud dataset generator
//!
//! Generates a labeled, time-ordered ledger with behavioral features and
//! writes it as CSV.

use clap::{value_parser, Arg, ArgMatches, Command};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fraudsynth::{
    config::GeneratorConfig, export, utils, FraudDatasetGenerator, GeneratedDataset, SynthError,
};

#[tokio::main]
async fn main() {
    init_logging();

    let matches = Command::new("FraudSynth")
        .version(env!("CARGO_PKG_VERSION"))
        .author("SafeBank Team")
        .about("Synthetic payment fraud dataset generator")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("JSON configuration file path"),
        )
        .arg(
            Arg::new("small")
                .long("small")
                .global(true)
                .help("Use the small seeded configuration for quick runs")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a dataset and write it as CSV")
                .arg(seed_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .default_value("upi_fraud_dataset.csv")
                        .help("Output CSV path"),
                )
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .help("Run generation phases concurrently")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("shards")
                        .long("shards")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .default_value("4")
                        .help("Feature computation shards when running in parallel"),
                ),
        )
        .subcommand(
            Command::new("summary")
                .about("Generate a dataset in memory and print its statistics")
                .arg(seed_arg()),
        )
        .get_matches();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.to_user_message());
            std::process::exit(2);
        }
    };

    let outcome = match matches.subcommand() {
        Some(("generate", sub_matches)) => run_generate(config, sub_matches).await,
        Some(("summary", sub_matches)) => run_summary(config, sub_matches),
        _ => {
            println!("🏦 FraudSynth - Synthetic Payment Fraud Dataset Generator");
            println!("Use --help to see available commands");
            println!();
            println!("Quick start:");
            println!("  cargo run -- --small generate    # 500-row seeded dataset");
            println!("  cargo run -- summary --seed 7    # Print dataset statistics");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        error!(error = %e, "Run failed");
        eprintln!("❌ {}", e.to_user_message());
        std::process::exit(if e.is_config_error() { 2 } else { 1 });
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fraudsynth=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn seed_arg() -> Arg {
    Arg::new("seed")
        .short('s')
        .long("seed")
        .value_name("N")
        .value_parser(value_parser!(u64))
        .help("Seed for a reproducible dataset")
}

fn load_config(matches: &ArgMatches) -> Result<GeneratorConfig, SynthError> {
    let config = match matches.get_one::<String>("config") {
        Some(path) => GeneratorConfig::load_from_path(path)?,
        None if matches.get_flag("small") => GeneratorConfig::small(),
        None => GeneratorConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn apply_seed(mut config: GeneratorConfig, sub_matches: &ArgMatches) -> GeneratorConfig {
    if let Some(seed) = sub_matches.get_one::<u64>("seed") {
        config.seed = Some(*seed);
    }
    config
}

async fn run_generate(config: GeneratorConfig, sub_matches: &ArgMatches) -> Result<(), SynthError> {
    let generator = FraudDatasetGenerator::new(apply_seed(config, sub_matches));
    let output = sub_matches
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| "upi_fraud_dataset.csv".to_string());

    let dataset = if sub_matches.get_flag("parallel") {
        let shards = sub_matches.get_one::<usize>("shards").copied().unwrap_or(4);
        generator.generate_parallel(shards).await?
    } else {
        generator.generate()?
    };

    export::write_csv_file(&output, &dataset.ledger)?;
    let fingerprint = export::ledger_fingerprint(&dataset.ledger)?;
    info!(path = %output, rows = dataset.ledger.len(), "Wrote dataset");

    println!("✅ Dataset written to {}", output);
    println!("🔑 Fingerprint: {}", fingerprint);
    show_summary(&dataset);
    Ok(())
}

fn run_summary(config: GeneratorConfig, sub_matches: &ArgMatches) -> Result<(), SynthError> {
    let dataset = FraudDatasetGenerator::new(apply_seed(config, sub_matches)).generate()?;
    show_summary(&dataset);
    Ok(())
}

fn show_summary(dataset: &GeneratedDataset) {
    let summary = &dataset.summary;
    let mut stats: Vec<(String, f64)> = summary.statistics().into_iter().collect();
    stats.sort_by(|a, b| a.0.cmp(&b.0));

    println!("\n   📊 Dataset Statistics:");
    println!("      Accounts: {}", dataset.population.len());
    for (key, value) in stats {
        match key.as_str() {
            "total_transactions" => println!("      Total Transactions: {:.0}", value),
            "fraud_transactions" => println!("      Fraud Transactions: {:.0}", value),
            "failed_transactions" => println!("      Failed: {:.0}", value),
            "distinct_senders" => println!("      Distinct Senders: {:.0}", value),
            "fraud_rate_percent" => println!("      Fraud Rate: {:.2}%", value),
            "total_volume" => println!("      Total Volume: {}", utils::format_currency(value)),
            "fraud_volume" => println!("      Fraud Volume: {}", utils::format_currency(value)),
            _ => println!("      {}: {:.0}", key.replace('_', " "), value),
        }
    }

    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        println!("\n   🕒 Time span: {} → {}", first.format("%Y-%m-%d %H:%M"), last.format("%Y-%m-%d %H:%M"));
    }
}
