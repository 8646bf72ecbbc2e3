//! Behavioral feature derivation
//!
//! Runs over the time-sorted ledger, one sender at a time. Every value is
//! causal: it only looks at the sender's transactions at or before the current
//! one in ledger order. The change flags compare against the sender's static
//! profile rather than the previous transaction.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::{profiles::Population, AccountProfile, Transaction};

/// Trailing horizons aggregated for every transaction, in seconds
pub const WINDOW_1H_SECS: i64 = 3_600;
pub const WINDOW_24H_SECS: i64 = 86_400;
pub const WINDOW_7D_SECS: i64 = 7 * 86_400;

/// Aggregate over one trailing window, excluding the current transaction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowAggregate {
    pub txn_count: u32,
    pub unique_receivers: u32,
    pub avg_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedFeatures {
    /// Seconds since the sender's previous transaction, 0 for the first one
    pub time_since_last_txn: i64,
    pub last_1h: WindowAggregate,
    pub last_24h: WindowAggregate,
    pub last_7d: WindowAggregate,
    /// Current amount over the 7-day average, 0 with no 7-day history
    pub amount_to_avg_ratio_7d: f64,
    pub location_change_flag: bool,
    pub device_change_flag: bool,
    pub hour_of_day: u32,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    pub is_weekend: bool,
}

/// A transaction and the features derived for it. The transaction is carried
/// as generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTransaction {
    pub transaction: Transaction,
    pub features: DerivedFeatures,
}

/// Sliding window over one sender's transaction sequence.
///
/// `start..end` is the current window content. Both pointers only move
/// forward, which holds as long as the sequence is time-ordered.
struct RollingWindow<'a> {
    span: Duration,
    start: usize,
    end: usize,
    amount_sum: f64,
    receivers: HashMap<&'a str, u32>,
}

impl<'a> RollingWindow<'a> {
    fn new(span_secs: i64) -> Self {
        Self {
            span: Duration::seconds(span_secs),
            start: 0,
            end: 0,
            amount_sum: 0.0,
            receivers: HashMap::new(),
        }
    }

    /// Aggregate over `history[..current]` restricted to `[t - span, t]`
    fn advance(&mut self, history: &[&'a Transaction], current: usize) -> WindowAggregate {
        while self.end < current {
            let txn = history[self.end];
            self.amount_sum += txn.amount;
            *self.receivers.entry(txn.receiver_id.as_str()).or_insert(0) += 1;
            self.end += 1;
        }

        let cutoff = history[current].timestamp - self.span;
        while self.start < self.end && history[self.start].timestamp < cutoff {
            let txn = history[self.start];
            self.amount_sum -= txn.amount;
            if let Some(count) = self.receivers.get_mut(txn.receiver_id.as_str()) {
                *count -= 1;
                if *count == 0 {
                    self.receivers.remove(txn.receiver_id.as_str());
                }
            }
            self.start += 1;
        }

        let txn_count = (self.end - self.start) as u32;
        if txn_count == 0 {
            self.amount_sum = 0.0;
            return WindowAggregate::default();
        }

        WindowAggregate {
            txn_count,
            unique_receivers: self.receivers.len() as u32,
            avg_amount: self.amount_sum / txn_count as f64,
        }
    }
}

pub struct FeatureEngine<'a> {
    population: &'a Population,
}

impl<'a> FeatureEngine<'a> {
    pub fn new(population: &'a Population) -> Self {
        Self { population }
    }

    /// Ledger indices per sender, in ledger order. Senders are ordered by id.
    pub fn group_by_sender(ledger: &[Transaction]) -> BTreeMap<&str, Vec<usize>> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, txn) in ledger.iter().enumerate() {
            groups.entry(txn.sender_id.as_str()).or_default().push(i);
        }
        groups
    }

    /// Features for one sender's transactions, given as ledger indices in order
    pub fn compute_sender(&self, ledger: &[Transaction], indices: &[usize]) -> Vec<(usize, DerivedFeatures)> {
        let history: Vec<&Transaction> = indices.iter().map(|&i| &ledger[i]).collect();
        let profile = history
            .first()
            .and_then(|t| self.population.get(&t.sender_id));

        let mut hour = RollingWindow::new(WINDOW_1H_SECS);
        let mut day = RollingWindow::new(WINDOW_24H_SECS);
        let mut week = RollingWindow::new(WINDOW_7D_SECS);

        let mut out = Vec::with_capacity(indices.len());
        for (pos, &ledger_index) in indices.iter().enumerate() {
            let txn = history[pos];
            let mut features = static_features(txn, profile);

            features.time_since_last_txn = match pos {
                0 => 0,
                _ => (txn.timestamp - history[pos - 1].timestamp).num_seconds(),
            };
            features.last_1h = hour.advance(&history, pos);
            features.last_24h = day.advance(&history, pos);
            features.last_7d = week.advance(&history, pos);
            features.amount_to_avg_ratio_7d = if features.last_7d.avg_amount > 0.0 {
                txn.amount / features.last_7d.avg_amount
            } else {
                0.0
            };

            out.push((ledger_index, features));
        }
        out
    }

    /// Features for the whole ledger, aligned with ledger order
    pub fn compute(&self, ledger: &[Transaction]) -> Vec<DerivedFeatures> {
        let mut features = vec![DerivedFeatures::default(); ledger.len()];
        for indices in Self::group_by_sender(ledger).values() {
            for (i, f) in self.compute_sender(ledger, indices) {
                features[i] = f;
            }
        }
        features
    }

    /// Enrich the ledger on the current thread
    pub fn enrich(&self, ledger: Vec<Transaction>) -> Vec<EnrichedTransaction> {
        let features = self.compute(&ledger);
        attach(ledger, features)
    }
}

/// Pair each transaction with its features; both must be in ledger order
pub fn attach(ledger: Vec<Transaction>, features: Vec<DerivedFeatures>) -> Vec<EnrichedTransaction> {
    ledger
        .into_iter()
        .zip(features)
        .map(|(transaction, features)| EnrichedTransaction {
            transaction,
            features,
        })
        .collect()
}

/// Profile comparison and calendar fields
fn static_features(txn: &Transaction, profile: Option<&AccountProfile>) -> DerivedFeatures {
    let weekday = txn.timestamp.weekday();
    DerivedFeatures {
        location_change_flag: profile.is_some_and(|p| p.typical_location != txn.location.city),
        device_change_flag: profile.is_some_and(|p| p.typical_device != txn.device_type),
        hour_of_day: txn.timestamp.hour(),
        day_of_week: weekday.num_days_from_monday(),
        is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        ..Default::default()
    }
}
