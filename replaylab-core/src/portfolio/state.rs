//! Cash, open positions and pending settlements for one run.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::data::Universe;
use crate::domain::Position;

/// Sorted, distinct trading days observed in the run's data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingCalendar {
    days: Vec<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(mut days: Vec<NaiveDate>) -> Self {
        days.sort_unstable();
        days.dedup();
        Self { days }
    }

    pub fn from_universe(universe: &Universe) -> Self {
        Self::new(
            universe
                .iter()
                .flat_map(|s| s.bars().iter().map(|b| b.timestamp.date()))
                .collect(),
        )
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    /// The trading day `lag` sessions after `day`.
    ///
    /// Clamped to the last known day. Days outside the calendar fall back to
    /// counting weekdays.
    pub fn settlement_date(&self, day: NaiveDate, lag: usize) -> NaiveDate {
        match self.days.binary_search(&day) {
            Ok(i) => self.days[(i + lag).min(self.days.len() - 1)],
            Err(_) => add_weekdays(day, lag),
        }
    }
}

fn add_weekdays(mut day: NaiveDate, mut n: usize) -> NaiveDate {
    while n > 0 {
        day += Duration::days(1);
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            n -= 1;
        }
    }
    day
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    cash: f64,
    positions: BTreeMap<String, Position>,
    pending_settlements: BTreeMap<NaiveDate, f64>,
    marks: BTreeMap<String, f64>,
    calendar: TradingCalendar,
    settlement_lag: usize,
}

impl PortfolioState {
    pub fn new(initial_cash: f64, calendar: TradingCalendar, settlement_lag: usize) -> Self {
        Self {
            cash: initial_cash,
            positions: BTreeMap::new(),
            pending_settlements: BTreeMap::new(),
            marks: BTreeMap::new(),
            calendar,
            settlement_lag,
        }
    }

    /// Cash available to open positions now.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn pending_cash(&self) -> f64 {
        self.pending_settlements.values().sum()
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    /// Capital committed at entry prices.
    pub fn deployed(&self) -> f64 {
        self.positions.values().map(Position::cost_basis).sum()
    }

    /// Latest known price for `ticker`, falling back to its entry price.
    pub fn mark_price(&self, ticker: &str) -> Option<f64> {
        self.marks
            .get(ticker)
            .copied()
            .or_else(|| self.positions.get(ticker).map(|p| p.average_entry_price))
    }

    /// Cash plus positions marked to market. Unsettled proceeds are excluded.
    pub fn equity(&self) -> f64 {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.market_value(self.mark_price(&p.ticker).unwrap_or(p.average_entry_price)))
                .sum::<f64>()
    }

    /// Equity including unsettled proceeds.
    pub fn net_liquidation_value(&self) -> f64 {
        self.equity() + self.pending_cash()
    }

    pub fn mark(&mut self, ticker: &str, price: f64) {
        self.marks.insert(ticker.to_string(), price);
    }

    /// Move every settlement due on or before `today` into cash. Returns the amount released.
    pub fn release_settlements(&mut self, today: NaiveDate) -> f64 {
        let later = self.pending_settlements.split_off(&(today + Duration::days(1)));
        let released: f64 = std::mem::replace(&mut self.pending_settlements, later)
            .values()
            .sum();
        self.cash += released;
        released
    }

    /// Release everything still pending, regardless of date.
    pub fn settle_all(&mut self) -> f64 {
        let released = self.pending_cash();
        self.pending_settlements.clear();
        self.cash += released;
        released
    }

    // ─── Mutations applied by the execution simulator ────────────────

    pub(crate) fn debit(&mut self, amount: f64) {
        self.cash -= amount;
    }

    /// Queue `amount` to become cash `settlement_lag` trading days after `at`.
    pub(crate) fn schedule_settlement(&mut self, at: NaiveDateTime, amount: f64) {
        let day = self.calendar.settlement_date(at.date(), self.settlement_lag);
        *self.pending_settlements.entry(day).or_insert(0.0) += amount;
    }

    pub(crate) fn position_mut(&mut self, ticker: &str) -> Option<&mut Position> {
        self.positions.get_mut(ticker)
    }

    pub(crate) fn insert_position(&mut self, position: Position) {
        self.positions.insert(position.ticker.clone(), position);
    }

    pub(crate) fn remove_position(&mut self, ticker: &str) -> Option<Position> {
        self.positions.remove(ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::test_support::ts;

    fn day(i: i64) -> NaiveDate {
        ts(i).date()
    }

    #[test]
    fn settlement_uses_calendar_sessions() {
        // Sessions on days 0, 1, 3, 4: day 0 + 2 sessions = day 3.
        let cal = TradingCalendar::new(vec![day(4), day(0), day(3), day(1)]);
        assert_eq!(cal.settlement_date(day(0), 2), day(3));
        assert_eq!(cal.settlement_date(day(3), 2), day(4));
    }

    #[test]
    fn off_calendar_days_skip_weekends() {
        // 2024-01-05 is a Friday.
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let cal = TradingCalendar::default();
        assert_eq!(
            cal.settlement_date(friday, 2),
            NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
        );
    }

    #[test]
    fn proceeds_are_unavailable_until_settled() {
        let cal = TradingCalendar::new((0..10).map(day).collect());
        let mut state = PortfolioState::new(0.0, cal, 2);
        state.schedule_settlement(ts(0), 500.0);

        assert_eq!(state.release_settlements(day(1)), 0.0);
        assert_eq!(state.cash(), 0.0);
        assert_eq!(state.pending_cash(), 500.0);
        assert_eq!(state.net_liquidation_value(), 500.0);

        assert_eq!(state.release_settlements(day(2)), 500.0);
        assert_eq!(state.cash(), 500.0);
        assert_eq!(state.pending_cash(), 0.0);
    }

    #[test]
    fn equity_marks_positions() {
        let mut state = PortfolioState::new(1_000.0, TradingCalendar::default(), 2);
        state.insert_position(Position::open("SPY", Side::Long, 10.0, 50.0, ts(0)));
        state.debit(500.0);
        assert_eq!(state.equity(), 1_000.0);
        state.mark("SPY", 60.0);
        assert_eq!(state.equity(), 1_100.0);
        assert_eq!(state.deployed(), 500.0);
    }
}
