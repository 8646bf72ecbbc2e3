//! Fraud scenario generation
//! Five injected patterns, each with its own statistical signature

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::GeneratorConfig,
    errors::{Result, SynthError},
    legitimate::{find_city, random_merchant, NORMAL_JITTER_DEGREES},
    profiles::Population,
    timeline::GeneratedBatch,
    utils, AccountProfile, DeviceType, Location, Transaction, TransactionStatus, TransactionType,
};

/// Coordinate noise when a phishing victim's environment drifts, in degrees
pub const PHISHING_JITTER_DEGREES: f64 = 0.05;

/// Span after the anchor inside which a velocity burst lands
pub const VELOCITY_WINDOW_SECS: i64 = 60;

/// Shortest window that fits a probe lead before and a burst after an anchor
pub const MIN_FRAUD_WINDOW_SECS: i64 = PROBE_LEAD_SECS.1 + VELOCITY_WINDOW_SECS;

const PHISHING_DEVIATION_PROBABILITY: f64 = 0.3;
const PROBE_LEAD_SECS: (i64, i64) = (60, 300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FraudScenario {
    #[serde(rename = "ATO")]
    AccountTakeover,
    #[serde(rename = "Phishing")]
    Phishing,
    #[serde(rename = "Small_Large")]
    SmallThenLarge,
    #[serde(rename = "High_Velocity")]
    HighVelocity,
    #[serde(rename = "International_Anomaly")]
    InternationalAnomaly,
}

impl FraudScenario {
    pub const ALL: [FraudScenario; 5] = [
        FraudScenario::AccountTakeover,
        FraudScenario::Phishing,
        FraudScenario::SmallThenLarge,
        FraudScenario::HighVelocity,
        FraudScenario::InternationalAnomaly,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FraudScenario::AccountTakeover => "ATO",
            FraudScenario::Phishing => "Phishing",
            FraudScenario::SmallThenLarge => "Small_Large",
            FraudScenario::HighVelocity => "High_Velocity",
            FraudScenario::InternationalAnomaly => "International_Anomaly",
        }
    }
}

impl fmt::Display for FraudScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything one scenario iteration emitted
#[derive(Debug, Clone)]
pub struct ScenarioInstance {
    pub scenario: FraudScenario,
    pub account_id: String,
    pub anchor: DateTime<Utc>,
    /// Side transactions on top of the main one (High-Velocity only)
    pub burst_count: usize,
    pub transactions: Vec<Transaction>,
}

/// Environment drawn once per instance and shared by all of its transactions
#[derive(Debug, Clone)]
struct InstanceContext {
    scenario: FraudScenario,
    sender_id: String,
    sender_bank: String,
    receiver_bank: String,
    device_type: DeviceType,
    ip_address: Ipv4Addr,
    location: Location,
}

pub struct FraudScenarioGenerator<'a> {
    config: &'a GeneratorConfig,
    actors: Vec<&'a AccountProfile>,
    scenarios: Vec<FraudScenario>,
    weights: WeightedIndex<f64>,
}

impl<'a> FraudScenarioGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig, population: &'a Population) -> Result<Self> {
        let actors = population.fraud_designated();
        if actors.is_empty() {
            return Err(SynthError::EmptyPopulation {
                subset: "fraud-designated".to_string(),
            });
        }

        let pairs = config.scenario_weights.as_pairs();
        let weights = WeightedIndex::new(pairs.iter().map(|(_, w)| *w))
            .map_err(|e| SynthError::invalid(format!("scenario weights rejected: {}", e)))?;

        Ok(Self {
            config,
            actors,
            scenarios: pairs.iter().map(|(s, _)| *s).collect(),
            weights,
        })
    }

    /// Run scenario iterations until at least `target` fraud transactions exist
    pub fn generate<R: Rng + ?Sized>(&self, target: usize, rng: &mut R) -> GeneratedBatch {
        let mut batch = GeneratedBatch::with_capacity(target + 8);
        let mut per_scenario: BTreeMap<FraudScenario, usize> = BTreeMap::new();

        while batch.len() < target {
            let instance = self.next_instance(rng);
            debug!(
                scenario = %instance.scenario,
                account = %instance.account_id,
                emitted = instance.transactions.len(),
                "Injected fraud scenario"
            );
            *per_scenario.entry(instance.scenario).or_insert(0) += 1;
            for transaction in instance.transactions {
                batch.record(transaction);
            }
        }

        info!(
            generated = batch.len(),
            target,
            instances = ?per_scenario,
            "Generated fraud transactions"
        );

        batch
    }

    /// One iteration: weighted scenario, uniform actor, anchor inside the window
    pub fn next_instance<R: Rng + ?Sized>(&self, rng: &mut R) -> ScenarioInstance {
        let actor = *utils::pick(rng, &self.actors);
        let scenario = self.scenarios[self.weights.sample(rng)];
        let anchor = self.anchor(rng);
        self.run_scenario(scenario, actor, anchor, rng)
    }

    pub fn run_scenario<R: Rng + ?Sized>(
        &self,
        scenario: FraudScenario,
        actor: &AccountProfile,
        anchor: DateTime<Utc>,
        rng: &mut R,
    ) -> ScenarioInstance {
        let context = self.instance_context(scenario, actor, rng);
        let main_type = if rng.gen_bool(0.5) {
            TransactionType::P2P
        } else {
            TransactionType::P2M
        };

        let (transactions, burst_count) = match scenario {
            FraudScenario::AccountTakeover => {
                (vec![self.account_takeover(actor, anchor, main_type, context, rng)], 0)
            }
            FraudScenario::Phishing => (vec![self.phishing(actor, anchor, main_type, context, rng)], 0),
            FraudScenario::SmallThenLarge => {
                (self.small_then_large(anchor, main_type, &context, rng), 0)
            }
            FraudScenario::HighVelocity => {
                let txns = self.high_velocity(anchor, main_type, &context, rng);
                let burst = txns.len() - 1;
                (txns, burst)
            }
            FraudScenario::InternationalAnomaly => {
                (vec![self.international_anomaly(anchor, main_type, context, rng)], 0)
            }
        };

        ScenarioInstance {
            scenario,
            account_id: actor.id.clone(),
            anchor,
            burst_count,
            transactions,
        }
    }

    /// Leaves room for the probe before and the burst after the anchor
    fn anchor<R: Rng + ?Sized>(&self, rng: &mut R) -> DateTime<Utc> {
        let lo = self.config.start_date + Duration::seconds(PROBE_LEAD_SECS.1);
        let hi = self.config.end_date - Duration::seconds(VELOCITY_WINDOW_SECS);
        if lo < hi {
            utils::random_instant(rng, lo, hi)
        } else {
            utils::random_instant(rng, self.config.start_date, self.config.end_date)
        }
    }

    /// Banks, network, device and place for one instance, from the actor's usual environment
    fn instance_context<R: Rng + ?Sized>(
        &self,
        scenario: FraudScenario,
        actor: &AccountProfile,
        rng: &mut R,
    ) -> InstanceContext {
        let coordinates = find_city(&self.config.cities, &actor.typical_location)
            .map(|city| utils::jittered_coordinates(rng, city, NORMAL_JITTER_DEGREES));

        InstanceContext {
            scenario,
            sender_id: actor.id.clone(),
            sender_bank: utils::pick(rng, &self.config.banks).clone(),
            receiver_bank: utils::pick(rng, &self.config.banks).clone(),
            device_type: actor.typical_device,
            ip_address: utils::private_ip(rng),
            location: Location {
                city: actor.typical_location.clone(),
                coordinates,
            },
        }
    }

    /// Successful, fraud-labeled, in the instance's environment. P2M carries a merchant.
    fn emit<R: Rng + ?Sized>(
        &self,
        context: &InstanceContext,
        timestamp: DateTime<Utc>,
        receiver_id: String,
        amount: f64,
        txn_type: TransactionType,
        rng: &mut R,
    ) -> Transaction {
        let merchant = match txn_type {
            TransactionType::P2M => Some(random_merchant(rng, &self.config.merchant_categories)),
            _ => None,
        };

        Transaction {
            transaction_id: utils::random_uuid(rng),
            timestamp,
            sender_id: context.sender_id.clone(),
            receiver_id,
            amount,
            txn_type,
            status: TransactionStatus::Success,
            sender_bank: context.sender_bank.clone(),
            receiver_bank: context.receiver_bank.clone(),
            device_type: context.device_type,
            ip_address: context.ip_address,
            location: context.location.clone(),
            merchant,
            is_fraud: true,
            fraud_scenario: Some(context.scenario),
        }
    }

    /// Device, network and city all deviate at once
    fn account_takeover<R: Rng + ?Sized>(
        &self,
        actor: &AccountProfile,
        anchor: DateTime<Utc>,
        txn_type: TransactionType,
        mut context: InstanceContext,
        rng: &mut R,
    ) -> Transaction {
        context.device_type = other_device(actor.typical_device, rng);
        context.ip_address = utils::public_ip(rng);

        let elsewhere: Vec<_> = self
            .config
            .cities
            .iter()
            .filter(|c| c.name != actor.typical_location)
            .collect();
        if !elsewhere.is_empty() {
            let city = *utils::pick(rng, &elsewhere);
            context.location = Location {
                city: city.name.clone(),
                coordinates: Some(utils::jittered_coordinates(rng, city, NORMAL_JITTER_DEGREES)),
            };
        }

        let receiver = format!("ato_mule_{}", utils::random_token(rng));
        let amount = utils::random_amount(rng, 50_000.0, 500_000.0);
        self.emit(&context, anchor, receiver, amount, txn_type, rng)
    }

    /// Victim pays a scam account, mostly from their own environment
    fn phishing<R: Rng + ?Sized>(
        &self,
        actor: &AccountProfile,
        anchor: DateTime<Utc>,
        txn_type: TransactionType,
        mut context: InstanceContext,
        rng: &mut R,
    ) -> Transaction {
        if rng.gen_bool(PHISHING_DEVIATION_PROBABILITY) {
            context.device_type = other_device(actor.typical_device, rng);
            if let Some(city) = find_city(&self.config.cities, &actor.typical_location) {
                context.location.coordinates =
                    Some(utils::jittered_coordinates(rng, city, PHISHING_JITTER_DEGREES));
            }
        }

        let receiver = format!("phish_scam_{}", utils::random_token(rng));
        let amount = utils::random_amount(rng, 10_000.0, 200_000.0);
        self.emit(&context, anchor, receiver, amount, txn_type, rng)
    }

    /// P2P probe a few minutes ahead of a large payment, same receiver.
    /// The probe never predates `start_date`.
    fn small_then_large<R: Rng + ?Sized>(
        &self,
        anchor: DateTime<Utc>,
        txn_type: TransactionType,
        context: &InstanceContext,
        rng: &mut R,
    ) -> Vec<Transaction> {
        let receiver = format!("sl_fraud_{}", utils::random_token(rng));
        let lead = Duration::seconds(rng.gen_range(PROBE_LEAD_SECS.0..=PROBE_LEAD_SECS.1));
        let probe_time = (anchor - lead).max(self.config.start_date);

        let probe_amount = utils::random_amount(rng, 1.0, 100.0);
        let probe = self.emit(
            context,
            probe_time,
            receiver.clone(),
            probe_amount,
            TransactionType::P2P,
            rng,
        );

        let large_amount = utils::random_amount(rng, 50_000.0, 500_000.0);
        let large = self.emit(
            context,
            anchor,
            receiver,
            large_amount,
            txn_type,
            rng,
        );

        vec![probe, large]
    }

    /// Main payment plus 3-7 small P2P ones to distinct receivers within a minute
    fn high_velocity<R: Rng + ?Sized>(
        &self,
        anchor: DateTime<Utc>,
        main_type: TransactionType,
        context: &InstanceContext,
        rng: &mut R,
    ) -> Vec<Transaction> {
        let burst = rng.gen_range(3..=7);
        let mut receivers = HashSet::with_capacity(burst + 1);
        let mut txns = Vec::with_capacity(burst + 1);

        for i in 0..=burst {
            let receiver = loop {
                let candidate = format!("velocity_{}", utils::random_token(rng));
                if receivers.insert(candidate.clone()) {
                    break candidate;
                }
            };
            let (timestamp, txn_type) = if i == 0 {
                (anchor, main_type)
            } else {
                (
                    anchor + Duration::seconds(rng.gen_range(1..=VELOCITY_WINDOW_SECS)),
                    TransactionType::P2P,
                )
            };
            let amount = utils::random_amount(rng, 100.0, 5_000.0);
            txns.push(self.emit(
                context,
                timestamp,
                receiver,
                amount,
                txn_type,
                rng,
            ));
        }

        txns
    }

    /// Payment from a foreign city far outside the domestic coordinate range
    fn international_anomaly<R: Rng + ?Sized>(
        &self,
        anchor: DateTime<Utc>,
        txn_type: TransactionType,
        mut context: InstanceContext,
        rng: &mut R,
    ) -> Transaction {
        let city = utils::pick(rng, &self.config.foreign_cities);
        context.location = Location {
            city: city.name.clone(),
            coordinates: Some((rng.gen_range(-60.0..=70.0), rng.gen_range(-180.0..=180.0))),
        };
        context.ip_address = utils::public_ip(rng);

        let receiver = format!("intl_{}", utils::random_token(rng));
        let amount = utils::random_amount(rng, 20_000.0, 1_000_000.0);
        self.emit(
            &context,
            anchor,
            receiver,
            amount,
            txn_type,
            rng,
        )
    }
}

fn other_device<R: Rng + ?Sized>(typical: DeviceType, rng: &mut R) -> DeviceType {
    let others: Vec<DeviceType> = DeviceType::ALL
        .iter()
        .copied()
        .filter(|d| *d != typical)
        .collect();
    *utils::pick(rng, &others)
}
