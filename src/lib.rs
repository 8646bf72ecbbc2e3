//! FraudSynth - synthetic payment fraud dataset generator
//!
//! Builds a labeled ledger of P2P/P2M payment traffic for model training:
//! - Account population with typical location and device
//! - Legitimate traffic consistent with each sender's profile
//! - Five injected fraud scenarios with distinct signatures
//! - Causal behavioral features derived per sender

pub mod config;
pub mod errors;
pub mod export;
pub mod features;
pub mod fraud_scenarios;
pub mod legitimate;
pub mod pipeline;
pub mod profiles;
pub mod timeline;
pub mod utils;

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use config::GeneratorConfig;
pub use errors::{Result, SynthError};
pub use features::{DerivedFeatures, EnrichedTransaction};
pub use fraud_scenarios::FraudScenario;
pub use pipeline::{GeneratedDataset, LedgerSummary};
pub use profiles::Population;

/// Main generator entry point
#[derive(Debug, Clone)]
pub struct FraudDatasetGenerator {
    config: GeneratorConfig,
}

/// Whether an account acts honestly or is driven by a fraud scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountClass {
    Legitimate,
    FraudDesignated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Android,
    #[serde(rename = "iOS")]
    Ios,
    Web,
}

impl DeviceType {
    pub const ALL: [DeviceType; 3] = [DeviceType::Android, DeviceType::Ios, DeviceType::Web];
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Android => write!(f, "Android"),
            DeviceType::Ios => write!(f, "iOS"),
            DeviceType::Web => write!(f, "Web"),
        }
    }
}

/// Account profile, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: String,
    pub class: AccountClass,
    pub typical_location: String,
    pub typical_device: DeviceType,
}

impl AccountProfile {
    pub fn is_fraud_designated(&self) -> bool {
        self.class == AccountClass::FraudDesignated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    P2P,
    P2M,
    BillPayment,
    Recharge,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::P2P => write!(f, "P2P"),
            TransactionType::P2M => write!(f, "P2M"),
            TransactionType::BillPayment => write!(f, "BillPayment"),
            TransactionType::Recharge => write!(f, "Recharge"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Success,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Success => write!(f, "SUCCESS"),
            TransactionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// City label plus optional (latitude, longitude)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub coordinates: Option<(f64, f64)>,
}

/// Merchant details, only present on P2M payments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub merchant_id: String,
    pub merchant_category: String,
}

/// Transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: f64,
    pub txn_type: TransactionType,
    pub status: TransactionStatus,
    pub sender_bank: String,
    pub receiver_bank: String,
    pub device_type: DeviceType,
    pub ip_address: Ipv4Addr,
    pub location: Location,
    pub merchant: Option<Merchant>,
    pub is_fraud: bool,
    pub fraud_scenario: Option<FraudScenario>,
}

impl FraudDatasetGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Run the whole pipeline on the current thread
    pub fn generate(&self) -> Result<GeneratedDataset> {
        pipeline::run(&self.config)
    }

    /// Run generation phases concurrently and shard feature computation
    pub async fn generate_parallel(&self, shards: usize) -> Result<GeneratedDataset> {
        pipeline::run_parallel(&self.config, shards).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_initialization() {
        let generator = FraudDatasetGenerator::new(GeneratorConfig::small());
        assert!(generator.config().validate().is_ok());
    }

    #[test]
    fn test_enum_labels() {
        assert_eq!(DeviceType::Ios.to_string(), "iOS");
        assert_eq!(TransactionStatus::Success.to_string(), "SUCCESS");
        assert_eq!(TransactionType::BillPayment.to_string(), "BillPayment");
        assert_eq!(serde_json::to_string(&DeviceType::Ios).unwrap(), "\"iOS\"");
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Failed).unwrap(),
            "\"FAILED\""
        );
    }

    #[test]
    fn test_generate_small_dataset() {
        let generator = FraudDatasetGenerator::new(GeneratorConfig::small());
        let dataset = generator.generate().unwrap();
        assert!(dataset.ledger.len() >= 500);
        assert!(dataset.ledger.iter().any(|r| r.transaction.is_fraud));
    }
}
