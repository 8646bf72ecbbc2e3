//! Pipeline orchestration
//!
//! Profiles, then legitimate and fraud generation, then timeline assembly,
//! then feature derivation. Each phase draws from its own sub-generator
//! derived from the run seed, so the sequential and the parallel run produce
//! the same ledger.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tokio::task::{JoinError, JoinSet};
use tracing::info;

use crate::{
    config::GeneratorConfig,
    errors::{Result, SynthError},
    features::{self, DerivedFeatures, EnrichedTransaction, FeatureEngine},
    fraud_scenarios::{FraudScenario, FraudScenarioGenerator},
    legitimate::LegitimateGenerator,
    profiles::{Population, ProfileGenerator},
    timeline::{self, GeneratedBatch},
    utils, TransactionStatus,
};

/// Final output of a run
#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub population: Population,
    pub ledger: Vec<EnrichedTransaction>,
    pub summary: LedgerSummary,
}

impl GeneratedDataset {
    fn new(population: Population, ledger: Vec<EnrichedTransaction>) -> Self {
        let summary = LedgerSummary::from_ledger(&ledger);
        info!(
            transactions = summary.total_transactions,
            fraud = summary.fraud_transactions,
            fraud_rate = summary.fraud_rate(),
            "Dataset ready"
        );
        Self {
            population,
            ledger,
            summary,
        }
    }
}

struct PhaseRngs {
    profiles: StdRng,
    legitimate: StdRng,
    fraud: StdRng,
}

impl PhaseRngs {
    fn from_seed(seed: Option<u64>) -> Self {
        let mut master = utils::master_rng(seed);
        Self {
            profiles: utils::derive_rng(&mut master),
            legitimate: utils::derive_rng(&mut master),
            fraud: utils::derive_rng(&mut master),
        }
    }
}

fn generate_population(config: &GeneratorConfig, rng: &mut StdRng) -> Result<Population> {
    ProfileGenerator::generate(
        config.num_legit_accounts,
        config.num_fraud_accounts,
        &config.cities,
        rng,
    )
}

fn generate_legitimate(
    config: &GeneratorConfig,
    population: &Population,
    rng: &mut StdRng,
) -> Result<GeneratedBatch> {
    let generator = LegitimateGenerator::new(config, population)?;
    Ok(generator.generate(config.legit_target(), config.total_transactions, rng))
}

fn generate_fraud(
    config: &GeneratorConfig,
    population: &Population,
    rng: &mut StdRng,
) -> Result<GeneratedBatch> {
    let target = config.fraud_target();
    if !config.fraud_enabled() || target == 0 {
        return Ok(GeneratedBatch::default());
    }
    let generator = FraudScenarioGenerator::new(config, population)?;
    Ok(generator.generate(target, rng))
}

fn task_failed(e: JoinError) -> SynthError {
    SynthError::TaskFailed {
        message: e.to_string(),
    }
}

/// Run every phase on the current thread
pub fn run(config: &GeneratorConfig) -> Result<GeneratedDataset> {
    config.validate()?;
    info!(
        seed = ?config.seed,
        total = config.total_transactions,
        fraud_ratio = config.fraud_ratio,
        "Starting sequential generation"
    );

    let mut rngs = PhaseRngs::from_seed(config.seed);
    let population = generate_population(config, &mut rngs.profiles)?;
    let legitimate = generate_legitimate(config, &population, &mut rngs.legitimate)?;
    let fraud = generate_fraud(config, &population, &mut rngs.fraud)?;

    let ledger = timeline::assemble(legitimate, fraud);
    let enriched = FeatureEngine::new(&population).enrich(ledger);

    Ok(GeneratedDataset::new(population, enriched))
}

/// Run legitimate and fraud generation concurrently, then compute features in
/// `shards` blocking tasks over disjoint sender groups
pub async fn run_parallel(config: &GeneratorConfig, shards: usize) -> Result<GeneratedDataset> {
    config.validate()?;
    let shards = shards.max(1);
    info!(
        seed = ?config.seed,
        total = config.total_transactions,
        shards,
        "Starting parallel generation"
    );

    let PhaseRngs {
        mut profiles,
        mut legitimate,
        mut fraud,
    } = PhaseRngs::from_seed(config.seed);
    let population = Arc::new(generate_population(config, &mut profiles)?);
    let shared_config = Arc::new(config.clone());

    let legit_task = {
        let (config, population) = (shared_config.clone(), population.clone());
        tokio::task::spawn_blocking(move || generate_legitimate(&config, &population, &mut legitimate))
    };
    let fraud_task = {
        let (config, population) = (shared_config.clone(), population.clone());
        tokio::task::spawn_blocking(move || generate_fraud(&config, &population, &mut fraud))
    };
    let (legit_batch, fraud_batch) = tokio::join!(legit_task, fraud_task);
    let legit_batch = legit_batch.map_err(task_failed)??;
    let fraud_batch = fraud_batch.map_err(task_failed)??;

    let ledger = Arc::new(timeline::assemble(legit_batch, fraud_batch));

    let mut shard_groups: Vec<Vec<Vec<usize>>> = vec![Vec::new(); shards];
    for (i, indices) in FeatureEngine::group_by_sender(&ledger).into_values().enumerate() {
        shard_groups[i % shards].push(indices);
    }

    let mut tasks = JoinSet::new();
    for groups in shard_groups.into_iter().filter(|g| !g.is_empty()) {
        let (ledger, population) = (ledger.clone(), population.clone());
        tasks.spawn_blocking(move || {
            let engine = FeatureEngine::new(&population);
            groups
                .iter()
                .flat_map(|indices| engine.compute_sender(&ledger, indices))
                .collect::<Vec<_>>()
        });
    }

    let mut derived = vec![DerivedFeatures::default(); ledger.len()];
    while let Some(result) = tasks.join_next().await {
        for (i, f) in result.map_err(task_failed)? {
            derived[i] = f;
        }
    }

    let ledger = Arc::try_unwrap(ledger).unwrap_or_else(|shared| (*shared).clone());
    let population = Arc::try_unwrap(population).unwrap_or_else(|shared| (*shared).clone());

    Ok(GeneratedDataset::new(population, features::attach(ledger, derived)))
}

/// Aggregate view of a finished ledger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSummary {
    pub total_transactions: usize,
    pub fraud_transactions: usize,
    pub failed_transactions: usize,
    pub distinct_senders: usize,
    pub total_volume: f64,
    pub fraud_volume: f64,
    pub by_scenario: BTreeMap<FraudScenario, usize>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl LedgerSummary {
    pub fn from_ledger(ledger: &[EnrichedTransaction]) -> Self {
        let mut summary = LedgerSummary {
            total_transactions: ledger.len(),
            first_timestamp: ledger.first().map(|r| r.transaction.timestamp),
            last_timestamp: ledger.last().map(|r| r.transaction.timestamp),
            ..Default::default()
        };
        let mut senders = HashSet::new();

        for row in ledger {
            let txn = &row.transaction;
            senders.insert(txn.sender_id.as_str());
            summary.total_volume += txn.amount;
            if txn.status == TransactionStatus::Failed {
                summary.failed_transactions += 1;
            }
            if txn.is_fraud {
                summary.fraud_transactions += 1;
                summary.fraud_volume += txn.amount;
            }
            if let Some(scenario) = txn.fraud_scenario {
                *summary.by_scenario.entry(scenario).or_insert(0) += 1;
            }
        }

        summary.distinct_senders = senders.len();
        summary
    }

    pub fn fraud_rate(&self) -> f64 {
        if self.total_transactions == 0 {
            0.0
        } else {
            self.fraud_transactions as f64 / self.total_transactions as f64
        }
    }

    /// Flat numeric view for reporting
    pub fn statistics(&self) -> HashMap<String, f64> {
        let mut stats = HashMap::new();

        stats.insert("total_transactions".to_string(), self.total_transactions as f64);
        stats.insert("fraud_transactions".to_string(), self.fraud_transactions as f64);
        stats.insert("failed_transactions".to_string(), self.failed_transactions as f64);
        stats.insert("distinct_senders".to_string(), self.distinct_senders as f64);
        stats.insert("total_volume".to_string(), self.total_volume);
        stats.insert("fraud_volume".to_string(), self.fraud_volume);
        stats.insert("fraud_rate_percent".to_string(), self.fraud_rate() * 100.0);

        for scenario in FraudScenario::ALL {
            let count = self.by_scenario.get(&scenario).copied().unwrap_or(0);
            stats.insert(format!("scenario_{}", scenario.label().to_lowercase()), count as f64);
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export;
    use crate::TransactionType;

    fn small_dataset(seed: u64) -> GeneratedDataset {
        let mut config = GeneratorConfig::small();
        config.seed = Some(seed);
        run(&config).unwrap()
    }

    #[test]
    fn test_fraud_label_matches_origin() {
        let dataset = small_dataset(1);
        for row in &dataset.ledger {
            let txn = &row.transaction;
            let sender = dataset.population.get(&txn.sender_id).unwrap();
            assert_eq!(txn.is_fraud, txn.fraud_scenario.is_some());
            // Legitimate traffic only ever leaves legitimate accounts
            assert_eq!(txn.is_fraud, sender.is_fraud_designated());
        }
        assert!(dataset.summary.fraud_transactions >= 50);
    }

    #[test]
    fn test_merchant_presence_matches_type() {
        let dataset = small_dataset(2);
        for row in &dataset.ledger {
            let txn = &row.transaction;
            assert_eq!(txn.merchant.is_some(), txn.txn_type == TransactionType::P2M);
        }
    }

    #[test]
    fn test_ledger_is_time_ordered() {
        let dataset = small_dataset(3);
        assert!(dataset
            .ledger
            .windows(2)
            .all(|w| w[0].transaction.timestamp <= w[1].transaction.timestamp));
    }

    #[test]
    fn test_time_since_last_is_exact_delta() {
        let dataset = small_dataset(4);
        let mut last_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for row in &dataset.ledger {
            let txn = &row.transaction;
            let expected = match last_seen.get(txn.sender_id.as_str()) {
                Some(previous) => (txn.timestamp - *previous).num_seconds(),
                None => 0,
            };
            assert_eq!(row.features.time_since_last_txn, expected);
            last_seen.insert(txn.sender_id.as_str(), txn.timestamp);
        }
    }

    #[test]
    fn test_location_flag_matches_profile() {
        let dataset = small_dataset(5);
        for row in &dataset.ledger {
            let txn = &row.transaction;
            let sender = dataset.population.get(&txn.sender_id).unwrap();
            assert_eq!(
                row.features.location_change_flag,
                txn.location.city != sender.typical_location
            );
            assert_eq!(
                row.features.device_change_flag,
                txn.device_type != sender.typical_device
            );
        }
    }

    #[test]
    fn test_empty_fraud_population_fails_before_output() {
        let mut config = GeneratorConfig::small();
        config.num_fraud_accounts = 0;
        assert!(matches!(run(&config), Err(SynthError::EmptyPopulation { .. })));
    }

    #[test]
    fn test_fraud_disabled_produces_clean_ledger() {
        let mut config = GeneratorConfig::small();
        config.fraud_ratio = 0.0;
        config.num_fraud_accounts = 0;
        let dataset = run(&config).unwrap();

        assert_eq!(dataset.ledger.len(), 500);
        assert_eq!(dataset.summary.fraud_transactions, 0);
        assert!(dataset.summary.by_scenario.is_empty());
    }

    #[test]
    fn test_same_seed_is_byte_identical() {
        let first = export::to_csv_bytes(&small_dataset(6).ledger).unwrap();
        let second = export::to_csv_bytes(&small_dataset(6).ledger).unwrap();
        assert_eq!(first, second);

        let other = export::to_csv_bytes(&small_dataset(7).ledger).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_summary_statistics() {
        let dataset = small_dataset(8);
        let stats = dataset.summary.statistics();

        assert_eq!(stats["total_transactions"], dataset.ledger.len() as f64);
        let scenario_total: f64 = FraudScenario::ALL
            .iter()
            .map(|s| stats[&format!("scenario_{}", s.label().to_lowercase())])
            .sum();
        assert_eq!(scenario_total, stats["fraud_transactions"]);
        assert!(stats["fraud_rate_percent"] > 0.0);
        assert!(dataset.summary.first_timestamp <= dataset.summary.last_timestamp);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_matches_sequential() {
        let config = GeneratorConfig::small();
        let sequential = run(&config).unwrap();
        let parallel = run_parallel(&config, 4).await.unwrap();

        assert_eq!(sequential.ledger, parallel.ledger);
        assert_eq!(sequential.summary, parallel.summary);
        assert_eq!(
            export::ledger_fingerprint(&sequential.ledger).unwrap(),
            export::ledger_fingerprint(&parallel.ledger).unwrap()
        );
    }

    #[tokio::test]
    async fn test_parallel_validates_first() {
        let mut config = GeneratorConfig::small();
        config.end_date = config.start_date;
        assert!(matches!(
            run_parallel(&config, 2).await,
            Err(SynthError::InvalidConfiguration { .. })
        ));
    }
}
