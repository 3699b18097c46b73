use serde::{Deserialize, Serialize};

use crate::domain::{ClosedTrade, TradeRecord};

/// Append-only record of every fill and every completed round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeJournal {
    records: Vec<TradeRecord>,
    closed: Vec<ClosedTrade>,
}

impl TradeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: TradeRecord) {
        self.records.push(record);
    }

    pub fn record_close(&mut self, trade: ClosedTrade) {
        self.closed.push(trade);
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_parts(self) -> (Vec<TradeRecord>, Vec<ClosedTrade>) {
        (self.records, self.closed)
    }
}
