//! Configuration module for the dataset generator
//! Population sizes, date range, fixed category sets and fraud-scenario weights

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SynthError};
use crate::fraud_scenarios::{FraudScenario, MIN_FRAUD_WINDOW_SECS};

/// A domestic or foreign city with its reference coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl City {
    pub fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
        }
    }
}

/// Relative weights for picking a fraud scenario. Normalized at sampling time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioWeights {
    pub account_takeover: f64,
    pub phishing: f64,
    pub small_then_large: f64,
    pub high_velocity: f64,
    pub international_anomaly: f64,
}

impl Default for ScenarioWeights {
    fn default() -> Self {
        Self {
            account_takeover: 0.3,
            phishing: 0.2,
            small_then_large: 0.2,
            high_velocity: 0.15,
            international_anomaly: 0.05,
        }
    }
}

impl ScenarioWeights {
    /// Weights paired with their scenario, in a fixed order
    pub fn as_pairs(&self) -> [(FraudScenario, f64); 5] {
        [
            (FraudScenario::AccountTakeover, self.account_takeover),
            (FraudScenario::Phishing, self.phishing),
            (FraudScenario::SmallThenLarge, self.small_then_large),
            (FraudScenario::HighVelocity, self.high_velocity),
            (FraudScenario::InternationalAnomaly, self.international_anomaly),
        ]
    }

    /// Only one scenario enabled, everything else weighted zero
    pub fn only(scenario: FraudScenario) -> Self {
        let mut weights = Self {
            account_takeover: 0.0,
            phishing: 0.0,
            small_then_large: 0.0,
            high_velocity: 0.0,
            international_anomaly: 0.0,
        };
        match scenario {
            FraudScenario::AccountTakeover => weights.account_takeover = 1.0,
            FraudScenario::Phishing => weights.phishing = 1.0,
            FraudScenario::SmallThenLarge => weights.small_then_large = 1.0,
            FraudScenario::HighVelocity => weights.high_velocity = 1.0,
            FraudScenario::InternationalAnomaly => weights.international_anomaly = 1.0,
        }
        weights
    }

    fn validate(&self) -> Result<()> {
        let mut total = 0.0;
        for (scenario, weight) in self.as_pairs() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SynthError::invalid(format!(
                    "weight for {} must be a non-negative number, got {}",
                    scenario, weight
                )));
            }
            total += weight;
        }
        if total <= 0.0 {
            return Err(SynthError::invalid("scenario weights must sum to a positive total"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Seed for the run. `None` draws one from the OS.
    pub seed: Option<u64>,

    /// Population sizes
    pub num_legit_accounts: usize,
    pub num_fraud_accounts: usize,

    /// Total transactions to plan for, legitimate and fraud together
    pub total_transactions: usize,

    /// Share of `total_transactions` produced by fraud scenarios (0.0 to 1.0)
    pub fraud_ratio: f64,

    /// Simulation window
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,

    /// Fixed category sets
    pub banks: Vec<String>,
    pub cities: Vec<City>,
    pub foreign_cities: Vec<City>,
    pub merchant_categories: Vec<String>,

    pub scenario_weights: ScenarioWeights,
}

fn utc_from_secs(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn default_banks() -> Vec<String> {
    ["SBI", "HDFC", "ICICI", "Axis", "Kotak", "PNB", "Bank of Baroda", "Yes Bank"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cities() -> Vec<City> {
    vec![
        City::new("Mumbai", 19.0760, 72.8777),
        City::new("Delhi", 28.7041, 77.1025),
        City::new("Bangalore", 12.9716, 77.5946),
        City::new("Hyderabad", 17.3850, 78.4867),
        City::new("Chennai", 13.0827, 80.2707),
        City::new("Kolkata", 22.5726, 88.3639),
        City::new("Pune", 18.5204, 73.8567),
        City::new("Ahmedabad", 23.0225, 72.5714),
        City::new("Jaipur", 26.9124, 75.7873),
        City::new("Lucknow", 26.8467, 80.9462),
    ]
}

fn default_foreign_cities() -> Vec<City> {
    vec![
        City::new("Dubai", 25.2048, 55.2708),
        City::new("London", 51.5072, -0.1276),
        City::new("Singapore", 1.3521, 103.8198),
        City::new("New York", 40.7128, -74.0060),
        City::new("Lagos", 6.5244, 3.3792),
        City::new("Moscow", 55.7558, 37.6173),
        City::new("Hong Kong", 22.3193, 114.1694),
    ]
}

fn default_merchant_categories() -> Vec<String> {
    [
        "Grocery",
        "Electronics",
        "Restaurants",
        "Travel",
        "Fuel",
        "Pharmacy",
        "Apparel",
        "Entertainment",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let start_date = utc_from_secs(1_704_067_200); // 2024-01-01T00:00:00Z
        Self {
            seed: None,
            num_legit_accounts: 2000,
            num_fraud_accounts: 100,
            total_transactions: 50_000,
            fraud_ratio: 0.05,
            start_date,
            end_date: start_date + Duration::days(90),
            banks: default_banks(),
            cities: default_cities(),
            foreign_cities: default_foreign_cities(),
            merchant_categories: default_merchant_categories(),
            scenario_weights: ScenarioWeights::default(),
        }
    }
}

impl GeneratorConfig {
    /// Small, seeded configuration for demos and tests
    pub fn small() -> Self {
        let start_date = utc_from_secs(1_704_067_200);
        Self {
            seed: Some(42),
            num_legit_accounts: 50,
            num_fraud_accounts: 5,
            total_transactions: 500,
            fraud_ratio: 0.1,
            start_date,
            end_date: start_date + Duration::days(14),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: GeneratorConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Validate configuration settings before any generation begins
    pub fn validate(&self) -> Result<()> {
        if self.num_legit_accounts == 0 {
            return Err(SynthError::invalid("num_legit_accounts must be greater than 0"));
        }

        if self.total_transactions == 0 {
            return Err(SynthError::invalid("total_transactions must be greater than 0"));
        }

        if !self.fraud_ratio.is_finite() || !(0.0..=1.0).contains(&self.fraud_ratio) {
            return Err(SynthError::invalid(format!(
                "fraud_ratio must be within [0, 1], got {}",
                self.fraud_ratio
            )));
        }

        if self.end_date <= self.start_date {
            return Err(SynthError::invalid("end_date must be after start_date"));
        }

        if self.banks.is_empty() {
            return Err(SynthError::invalid("banks must not be empty"));
        }

        if self.cities.is_empty() {
            return Err(SynthError::invalid("cities must not be empty"));
        }

        if self.foreign_cities.is_empty() {
            return Err(SynthError::invalid("foreign_cities must not be empty"));
        }

        if self.merchant_categories.is_empty() {
            return Err(SynthError::invalid("merchant_categories must not be empty"));
        }

        self.scenario_weights.validate()?;

        if self.fraud_enabled() && self.window_seconds() <= MIN_FRAUD_WINDOW_SECS {
            return Err(SynthError::invalid(format!(
                "date window must be longer than {} seconds when fraud is enabled",
                MIN_FRAUD_WINDOW_SECS
            )));
        }

        if self.fraud_enabled() && self.num_fraud_accounts == 0 {
            return Err(SynthError::EmptyPopulation {
                subset: "fraud-designated".to_string(),
            });
        }

        Ok(())
    }

    pub fn fraud_enabled(&self) -> bool {
        self.fraud_ratio > 0.0
    }

    /// Number of fraud transactions to aim for
    pub fn fraud_target(&self) -> usize {
        (self.total_transactions as f64 * self.fraud_ratio).round() as usize
    }

    /// Number of legitimate transactions to generate
    pub fn legit_target(&self) -> usize {
        self.total_transactions.saturating_sub(self.fraud_target())
    }

    pub fn window_seconds(&self) -> i64 {
        (self.end_date - self.start_date).num_seconds()
    }
}
