//! CSV export and ledger fingerprinting

use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    errors::{Result, SynthError},
    features::EnrichedTransaction,
    DeviceType, FraudScenario, TransactionStatus, TransactionType,
};

/// One flat output row: transaction columns followed by feature columns
#[derive(Debug, Serialize)]
pub struct LedgerRow<'a> {
    pub transaction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub amount: f64,
    pub txn_type: TransactionType,
    pub status: TransactionStatus,
    pub sender_bank: &'a str,
    pub receiver_bank: &'a str,
    pub device_type: DeviceType,
    pub ip_address: Ipv4Addr,
    pub location_city: &'a str,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub merchant_id: Option<&'a str>,
    pub merchant_category: Option<&'a str>,
    pub is_fraud: u8,
    pub fraud_type: Option<FraudScenario>,
    pub time_since_last_txn: i64,
    pub txn_count_1h: u32,
    pub unique_receivers_1h: u32,
    pub avg_amount_1h: f64,
    pub txn_count_24h: u32,
    pub unique_receivers_24h: u32,
    pub avg_amount_24h: f64,
    pub txn_count_7d: u32,
    pub unique_receivers_7d: u32,
    pub avg_amount_7d: f64,
    pub amount_to_avg_ratio_7d: f64,
    pub location_change_flag: u8,
    pub device_change_flag: u8,
    pub hour_of_day: u32,
    pub day_of_week: u32,
    pub is_weekend: u8,
}

impl<'a> From<&'a EnrichedTransaction> for LedgerRow<'a> {
    fn from(row: &'a EnrichedTransaction) -> Self {
        let txn = &row.transaction;
        let f = &row.features;
        let (latitude, longitude) = match txn.location.coordinates {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };

        Self {
            transaction_id: txn.transaction_id,
            timestamp: txn.timestamp,
            sender_id: &txn.sender_id,
            receiver_id: &txn.receiver_id,
            amount: txn.amount,
            txn_type: txn.txn_type,
            status: txn.status,
            sender_bank: &txn.sender_bank,
            receiver_bank: &txn.receiver_bank,
            device_type: txn.device_type,
            ip_address: txn.ip_address,
            location_city: &txn.location.city,
            latitude,
            longitude,
            merchant_id: txn.merchant.as_ref().map(|m| m.merchant_id.as_str()),
            merchant_category: txn.merchant.as_ref().map(|m| m.merchant_category.as_str()),
            is_fraud: u8::from(txn.is_fraud),
            fraud_type: txn.fraud_scenario,
            time_since_last_txn: f.time_since_last_txn,
            txn_count_1h: f.last_1h.txn_count,
            unique_receivers_1h: f.last_1h.unique_receivers,
            avg_amount_1h: f.last_1h.avg_amount,
            txn_count_24h: f.last_24h.txn_count,
            unique_receivers_24h: f.last_24h.unique_receivers,
            avg_amount_24h: f.last_24h.avg_amount,
            txn_count_7d: f.last_7d.txn_count,
            unique_receivers_7d: f.last_7d.unique_receivers,
            avg_amount_7d: f.last_7d.avg_amount,
            amount_to_avg_ratio_7d: f.amount_to_avg_ratio_7d,
            location_change_flag: u8::from(f.location_change_flag),
            device_change_flag: u8::from(f.device_change_flag),
            hour_of_day: f.hour_of_day,
            day_of_week: f.day_of_week,
            is_weekend: u8::from(f.is_weekend),
        }
    }
}

/// Write the ledger as CSV with a header row
pub fn write_csv<W: Write>(writer: W, ledger: &[EnrichedTransaction]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in ledger {
        csv_writer.serialize(LedgerRow::from(row))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_csv_file(path: impl AsRef<Path>, ledger: &[EnrichedTransaction]) -> Result<()> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), ledger)
}

pub fn to_csv_bytes(ledger: &[EnrichedTransaction]) -> Result<Vec<u8>> {
    let mut csv_writer = csv::Writer::from_writer(Vec::new());
    for row in ledger {
        csv_writer.serialize(LedgerRow::from(row))?;
    }
    csv_writer
        .into_inner()
        .map_err(|e| SynthError::Io(e.into_error()))
}

/// Hex SHA-256 of the CSV rendering; equal seeds give equal fingerprints
pub fn ledger_fingerprint(ledger: &[EnrichedTransaction]) -> Result<String> {
    let bytes = to_csv_bytes(ledger)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
