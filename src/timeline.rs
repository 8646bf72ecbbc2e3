//! Timeline assembly: merge generator output into one time-ordered ledger

use std::collections::HashMap;

use tracing::info;

use crate::Transaction;

/// Output of one generator call
///
/// `history` maps each acting account to the indices of its transactions in
/// `transactions`. It only lives until assembly.
#[derive(Debug, Clone, Default)]
pub struct GeneratedBatch {
    pub transactions: Vec<Transaction>,
    pub history: HashMap<String, Vec<usize>>,
}

impl GeneratedBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            transactions: Vec::with_capacity(capacity),
            history: HashMap::new(),
        }
    }

    /// Append a transaction to the ledger and to its sender's history
    pub fn record(&mut self, transaction: Transaction) {
        let index = self.transactions.len();
        self.history
            .entry(transaction.sender_id.clone())
            .or_default()
            .push(index);
        self.transactions.push(transaction);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn active_accounts(&self) -> usize {
        self.history.len()
    }
}

/// Concatenate legitimate then fraud transactions and stable-sort by timestamp.
/// Ties keep insertion order.
pub fn assemble(legitimate: GeneratedBatch, fraud: GeneratedBatch) -> Vec<Transaction> {
    info!(
        legitimate = legitimate.len(),
        fraud = fraud.len(),
        legitimate_senders = legitimate.active_accounts(),
        fraud_senders = fraud.active_accounts(),
        "Assembling timeline"
    );

    let mut ledger = legitimate.transactions;
    ledger.extend(fraud.transactions);
    ledger.sort_by_key(|t| t.timestamp);
    ledger
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceType, Location, TransactionStatus, TransactionType};
    use chrono::{Duration, TimeZone, Utc};
    use std::net::Ipv4Addr;
    use uuid::Uuid;

    fn create_test_transaction(sender: &str, offset_secs: i64, is_fraud: bool) -> Transaction {
        Transaction {
            transaction_id: Uuid::new_v4(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            sender_id: sender.to_string(),
            receiver_id: "ACC000099".to_string(),
            amount: 100.0,
            txn_type: TransactionType::P2P,
            status: TransactionStatus::Success,
            sender_bank: "SBI".to_string(),
            receiver_bank: "HDFC".to_string(),
            device_type: DeviceType::Android,
            ip_address: Ipv4Addr::new(10, 0, 0, 1),
            location: Location {
                city: "Mumbai".to_string(),
                coordinates: None,
            },
            merchant: None,
            is_fraud,
            fraud_scenario: None,
        }
    }

    #[test]
    fn test_record_tracks_history() {
        let mut batch = GeneratedBatch::default();
        batch.record(create_test_transaction("A", 0, false));
        batch.record(create_test_transaction("B", 5, false));
        batch.record(create_test_transaction("A", 10, false));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.active_accounts(), 2);
        assert_eq!(batch.history["A"], vec![0, 2]);
    }

    #[test]
    fn test_assemble_sorts_by_timestamp() {
        let mut legit = GeneratedBatch::default();
        legit.record(create_test_transaction("A", 300, false));
        legit.record(create_test_transaction("B", 100, false));

        let mut fraud = GeneratedBatch::default();
        fraud.record(create_test_transaction("F", 200, true));

        let ledger = assemble(legit, fraud);
        let senders: Vec<&str> = ledger.iter().map(|t| t.sender_id.as_str()).collect();
        assert_eq!(senders, vec!["B", "F", "A"]);
        assert!(ledger.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut legit = GeneratedBatch::default();
        let first = create_test_transaction("A", 50, false);
        let second = create_test_transaction("B", 50, false);
        let (first_id, second_id) = (first.transaction_id, second.transaction_id);
        legit.record(first);
        legit.record(second);

        let mut fraud = GeneratedBatch::default();
        let third = create_test_transaction("F", 50, true);
        let third_id = third.transaction_id;
        fraud.record(third);

        let ledger = assemble(legit, fraud);
        let ids: Vec<Uuid> = ledger.iter().map(|t| t.transaction_id).collect();
        assert_eq!(ids, vec![first_id, second_id, third_id]);
    }
}
