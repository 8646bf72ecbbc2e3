//! Legitimate transaction generation
//! Bulk traffic drawn from legitimate senders, consistent with each sender's profile

use chrono::Duration;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::{debug, info};

use crate::{
    config::{City, GeneratorConfig},
    errors::{Result, SynthError},
    profiles::Population,
    timeline::GeneratedBatch,
    utils, AccountProfile, Location, Merchant, Transaction, TransactionStatus, TransactionType,
};

/// Coordinate noise for everyday transactions, in degrees
pub const NORMAL_JITTER_DEGREES: f64 = 0.01;

const SUCCESS_PROBABILITY: f64 = 0.98;

impl TransactionType {
    /// Share of each type in legitimate traffic
    pub const MIX: [(TransactionType, f64); 4] = [
        (TransactionType::P2P, 0.6),
        (TransactionType::P2M, 0.2),
        (TransactionType::BillPayment, 0.1),
        (TransactionType::Recharge, 0.1),
    ];

    /// Legitimate amount range for this type
    pub fn amount_range(&self) -> (f64, f64) {
        match self {
            TransactionType::P2P => (10.0, 5000.0),
            TransactionType::P2M => (50.0, 20000.0),
            TransactionType::BillPayment => (500.0, 15000.0),
            TransactionType::Recharge => (10.0, 500.0),
        }
    }
}

/// Categorical sampler over `TransactionType::MIX`
#[derive(Debug, Clone)]
pub struct TypeSampler {
    index: WeightedIndex<f64>,
}

impl TypeSampler {
    pub fn new() -> Result<Self> {
        let index = WeightedIndex::new(TransactionType::MIX.iter().map(|(_, w)| *w))
            .map_err(|e| SynthError::invalid(format!("transaction type weights rejected: {}", e)))?;
        Ok(Self { index })
    }
}

impl Distribution<TransactionType> for TypeSampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TransactionType {
        TransactionType::MIX[self.index.sample(rng)].0
    }
}

pub(crate) fn find_city<'a>(cities: &'a [City], name: &str) -> Option<&'a City> {
    cities.iter().find(|c| c.name == name)
}

pub(crate) fn random_merchant<R: Rng + ?Sized>(rng: &mut R, categories: &[String]) -> Merchant {
    Merchant {
        merchant_id: format!("MER{:05}", rng.gen_range(1..=99_999)),
        merchant_category: utils::pick(rng, categories).clone(),
    }
}

#[derive(Debug)]
pub struct LegitimateGenerator<'a> {
    config: &'a GeneratorConfig,
    senders: Vec<&'a AccountProfile>,
    receivers: Vec<&'a AccountProfile>,
    types: TypeSampler,
}

impl<'a> LegitimateGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig, population: &'a Population) -> Result<Self> {
        let senders = population.legitimate();
        if senders.is_empty() {
            return Err(SynthError::EmptyPopulation {
                subset: "legitimate".to_string(),
            });
        }

        Ok(Self {
            config,
            senders,
            receivers: population.all(),
            types: TypeSampler::new()?,
        })
    }

    /// Produce `count` legitimate transactions.
    ///
    /// A cursor walks forward from `start_date` in whole-second steps drawn
    /// from `[1, 2 * window / total_planned]`. Overshooting `end_date` resets
    /// the cursor to a uniform point inside the window.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        count: usize,
        total_planned: usize,
        rng: &mut R,
    ) -> GeneratedBatch {
        let mut batch = GeneratedBatch::with_capacity(count);
        let window = self.config.window_seconds();
        let max_step = (2 * window / total_planned.max(1) as i64).max(1);
        let mut cursor = 0_i64;
        let mut resets = 0usize;

        for _ in 0..count {
            cursor += rng.gen_range(1..=max_step);
            if cursor > window {
                cursor = rng.gen_range(0..=window);
                resets += 1;
            }
            let offset = Duration::seconds(cursor);
            let transaction = self.build_transaction(self.config.start_date + offset, rng);
            batch.record(transaction);
        }

        debug!(resets, "Cursor resets during legitimate generation");
        info!(
            generated = batch.len(),
            senders = batch.active_accounts(),
            "Generated legitimate transactions"
        );

        batch
    }

    fn build_transaction<R: Rng + ?Sized>(
        &self,
        timestamp: chrono::DateTime<chrono::Utc>,
        rng: &mut R,
    ) -> Transaction {
        let sender = *utils::pick(rng, &self.senders);
        let receiver = self.pick_receiver(sender, rng);

        let txn_type = self.types.sample(rng);
        let (min, max) = txn_type.amount_range();
        let amount = utils::random_amount(rng, min, max);

        let status = if rng.gen_bool(SUCCESS_PROBABILITY) {
            TransactionStatus::Success
        } else {
            TransactionStatus::Failed
        };

        let coordinates = find_city(&self.config.cities, &sender.typical_location)
            .map(|city| utils::jittered_coordinates(rng, city, NORMAL_JITTER_DEGREES));

        let merchant = match txn_type {
            TransactionType::P2M => Some(random_merchant(rng, &self.config.merchant_categories)),
            _ => None,
        };

        Transaction {
            transaction_id: utils::random_uuid(rng),
            timestamp,
            sender_id: sender.id.clone(),
            receiver_id: receiver.id.clone(),
            amount,
            txn_type,
            status,
            sender_bank: utils::pick(rng, &self.config.banks).clone(),
            receiver_bank: utils::pick(rng, &self.config.banks).clone(),
            device_type: sender.typical_device,
            ip_address: utils::private_ip(rng),
            location: Location {
                city: sender.typical_location.clone(),
                coordinates,
            },
            merchant,
            is_fraud: false,
            fraud_scenario: None,
        }
    }

    /// Any account can receive, including fraud-designated ones
    fn pick_receiver<R: Rng + ?Sized>(&self, sender: &AccountProfile, rng: &mut R) -> &'a AccountProfile {
        loop {
            let receiver = *utils::pick(rng, &self.receivers);
            if receiver.id != sender.id || self.receivers.len() == 1 {
                return receiver;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::ProfileGenerator;
    use crate::utils::master_rng;

    fn setup(seed: u64) -> (GeneratorConfig, Population) {
        let config = GeneratorConfig::small();
        let mut rng = master_rng(Some(seed));
        let population = ProfileGenerator::generate(
            config.num_legit_accounts,
            config.num_fraud_accounts,
            &config.cities,
            &mut rng,
        )
        .unwrap();
        (config, population)
    }

    #[test]
    fn test_generates_requested_count_in_window() {
        let (config, population) = setup(1);
        let generator = LegitimateGenerator::new(&config, &population).unwrap();
        let mut rng = master_rng(Some(10));
        let batch = generator.generate(400, 500, &mut rng);

        assert_eq!(batch.len(), 400);
        for t in &batch.transactions {
            assert!(t.timestamp >= config.start_date && t.timestamp <= config.end_date);
            assert!(!t.is_fraud);
            assert!(t.fraud_scenario.is_none());
            assert!(t.amount > 0.0);
        }
    }

    #[test]
    fn test_senders_are_legitimate_and_follow_profile() {
        let (config, population) = setup(2);
        let generator = LegitimateGenerator::new(&config, &population).unwrap();
        let mut rng = master_rng(Some(20));
        let batch = generator.generate(300, 300, &mut rng);

        for t in &batch.transactions {
            let sender = population.get(&t.sender_id).unwrap();
            assert!(!sender.is_fraud_designated());
            assert_eq!(t.device_type, sender.typical_device);
            assert_eq!(t.location.city, sender.typical_location);
            assert!(population.get(&t.receiver_id).is_some());
            assert_ne!(t.sender_id, t.receiver_id);
            assert!(t.ip_address.is_private());

            let city = find_city(&config.cities, &t.location.city).unwrap();
            let (lat, lon) = t.location.coordinates.unwrap();
            assert!((lat - city.latitude).abs() <= NORMAL_JITTER_DEGREES + 1e-9);
            assert!((lon - city.longitude).abs() <= NORMAL_JITTER_DEGREES + 1e-9);
        }
    }

    #[test]
    fn test_merchant_only_on_p2m_and_amount_ranges() {
        let (config, population) = setup(3);
        let generator = LegitimateGenerator::new(&config, &population).unwrap();
        let mut rng = master_rng(Some(30));
        let batch = generator.generate(500, 500, &mut rng);

        for t in &batch.transactions {
            assert_eq!(t.merchant.is_some(), t.txn_type == TransactionType::P2M);
            let (min, max) = t.txn_type.amount_range();
            assert!(t.amount >= min && t.amount <= max);
        }
    }

    #[test]
    fn test_history_matches_ledger() {
        let (config, population) = setup(4);
        let generator = LegitimateGenerator::new(&config, &population).unwrap();
        let mut rng = master_rng(Some(40));
        let batch = generator.generate(200, 200, &mut rng);

        let indexed: usize = batch.history.values().map(|v| v.len()).sum();
        assert_eq!(indexed, batch.len());
        for (account, indices) in &batch.history {
            for &i in indices {
                assert_eq!(&batch.transactions[i].sender_id, account);
            }
        }
    }

    #[test]
    fn test_type_distribution_roughly_matches() {
        let sampler = TypeSampler::new().unwrap();
        let mut rng = master_rng(Some(50));
        let draws = 10_000;
        let p2p = (0..draws)
            .filter(|_| sampler.sample(&mut rng) == TransactionType::P2P)
            .count();
        let recharge = sampler
            .sample_iter(&mut rng)
            .take(draws)
            .filter(|t| *t == TransactionType::Recharge)
            .count();
        assert!((p2p as f64 / draws as f64 - 0.6).abs() < 0.05);
        assert!((recharge as f64 / draws as f64 - 0.1).abs() < 0.03);
    }

    #[test]
    fn test_cursor_always_moves_forward() {
        let (config, population) = setup(6);
        let generator = LegitimateGenerator::new(&config, &population).unwrap();
        let mut rng = master_rng(Some(60));
        // Half the planned total cannot walk past the window end, so no reset happens
        let batch = generator.generate(250, 500, &mut rng);

        assert!(batch
            .transactions
            .windows(2)
            .all(|w| w[1].timestamp > w[0].timestamp));
    }

    #[test]
    fn test_dense_plan_still_advances() {
        let (mut config, population) = setup(7);
        config.end_date = config.start_date + Duration::seconds(100);
        let generator = LegitimateGenerator::new(&config, &population).unwrap();
        let mut rng = master_rng(Some(70));
        let batch = generator.generate(50, 10_000, &mut rng);

        assert!(batch
            .transactions
            .windows(2)
            .all(|w| w[1].timestamp > w[0].timestamp));
    }

    #[test]
    fn test_requires_legitimate_senders() {
        let config = GeneratorConfig::small();
        let population = Population::default();
        assert!(matches!(
            LegitimateGenerator::new(&config, &population),
            Err(SynthError::EmptyPopulation { .. })
        ));
    }
}
