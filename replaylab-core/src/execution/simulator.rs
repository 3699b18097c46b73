//! ExecutionSimulator: the only code that mutates positions and cash.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{ClosedTrade, Position, Signal, TradeAction, TradeRecord};
use crate::error::InvariantViolationError;
use crate::portfolio::PortfolioState;

use super::{ExecutionConfig, TradeJournal};

/// Quantities below this are treated as zero.
const QTY_EPSILON: f64 = 1e-9;

/// What the gating stages decided to do with a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Open or add `quantity` shares on the signal's side.
    Enter { quantity: f64 },
    /// Close `fraction` of the held quantity.
    Exit { fraction: f64 },
}

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub record: TradeRecord,
    /// The position is gone after this fill.
    pub closed_position: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionSimulator {
    config: ExecutionConfig,
    journal: TradeJournal,
    /// Entry commission not yet attributed to a closed trade, per ticker.
    open_commission: BTreeMap<String, f64>,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            journal: TradeJournal::new(),
            open_commission: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn journal(&self) -> &TradeJournal {
        &self.journal
    }

    pub fn into_journal(self) -> TradeJournal {
        self.journal
    }

    /// Apply `intent` for `signal`.
    ///
    /// Returns `Ok(None)` when the fill is skipped for lack of cash or of a
    /// position to close. Invariant breaches abort with an error before any
    /// state is touched.
    pub fn execute(
        &mut self,
        signal: &Signal,
        intent: Intent,
        state: &mut PortfolioState,
        max_entries_per_ticker: Option<usize>,
    ) -> Result<Option<Fill>, InvariantViolationError> {
        match intent {
            Intent::Enter { quantity } => {
                self.enter(signal, quantity, state, max_entries_per_ticker)
            }
            Intent::Exit { fraction } => self.exit(signal, fraction, state),
        }
    }

    fn enter(
        &mut self,
        signal: &Signal,
        quantity: f64,
        state: &mut PortfolioState,
        limit: Option<usize>,
    ) -> Result<Option<Fill>, InvariantViolationError> {
        let ticker = signal.ticker.as_str();
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(InvariantViolationError::NegativeQuantity {
                ticker: ticker.to_string(),
                held: state.position(ticker).map_or(0.0, |p| p.quantity),
                requested: quantity,
            });
        }

        let existing = state.position(ticker);
        if let Some(position) = existing {
            if position.side != signal.side {
                return Err(InvariantViolationError::SideConflict {
                    ticker: ticker.to_string(),
                    held: position.side,
                    requested: signal.side,
                });
            }
        }
        let attempted = existing.map_or(0, |p| p.entry_count) + 1;
        if let Some(limit) = limit {
            if attempted > limit {
                return Err(InvariantViolationError::ConcurrencyLimit {
                    ticker: ticker.to_string(),
                    limit,
                    attempted,
                });
            }
        }

        let price = self.config.fill_price(signal.signal_type, signal.price);
        let commission = self.config.commission(quantity);
        let cost = quantity * price + commission;
        if cost > state.cash() {
            warn!(
                ticker,
                timestamp = %signal.timestamp,
                cost,
                cash = state.cash(),
                "insufficient cash, entry skipped"
            );
            return Ok(None);
        }

        state.debit(cost);
        let action = match state.position_mut(ticker) {
            Some(position) => {
                position.scale_in(quantity, price);
                TradeAction::ScaleIn
            }
            None => {
                state.insert_position(Position::open(
                    ticker,
                    signal.side,
                    quantity,
                    price,
                    signal.timestamp,
                ));
                TradeAction::Open
            }
        };
        *self.open_commission.entry(ticker.to_string()).or_insert(0.0) += commission;

        let record = TradeRecord {
            ticker: ticker.to_string(),
            side: signal.side,
            signal_type: signal.signal_type,
            action,
            price,
            quantity,
            timestamp: signal.timestamp,
            commission,
            realized_pnl: None,
        };
        debug!(ticker, ?action, quantity, price, "entry filled");
        self.journal.record(record.clone());
        Ok(Some(Fill {
            record,
            closed_position: false,
        }))
    }

    fn exit(
        &mut self,
        signal: &Signal,
        fraction: f64,
        state: &mut PortfolioState,
    ) -> Result<Option<Fill>, InvariantViolationError> {
        let ticker = signal.ticker.as_str();
        let Some(position) = state.position(ticker).cloned() else {
            warn!(ticker, timestamp = %signal.timestamp, "exit with no open position skipped");
            return Ok(None);
        };

        let requested = if fraction >= 1.0 {
            position.quantity
        } else {
            position.quantity * fraction
        };
        if requested < 0.0 || requested > position.quantity + QTY_EPSILON || requested.is_nan() {
            return Err(InvariantViolationError::NegativeQuantity {
                ticker: ticker.to_string(),
                held: position.quantity,
                requested,
            });
        }
        if requested <= QTY_EPSILON {
            return Ok(None);
        }
        let quantity = requested.min(position.quantity);
        let remaining = position.quantity - quantity;
        let full = remaining <= QTY_EPSILON;

        let price = self.config.fill_price(signal.signal_type, signal.price);
        let commission = self.config.commission(quantity);
        let gross_pnl = position.unrealized_pnl(price) * (quantity / position.quantity);

        let open_commission = self.open_commission.get(ticker).copied().unwrap_or(0.0);
        let entry_share = if full {
            open_commission
        } else {
            open_commission * quantity / position.quantity
        };
        let net_pnl = gross_pnl - commission - entry_share;

        // Released capital: the committed cost basis plus the price move.
        let proceeds = quantity * position.average_entry_price + gross_pnl - commission;
        state.schedule_settlement(signal.timestamp, proceeds);

        if full {
            state.remove_position(ticker);
            self.open_commission.remove(ticker);
        } else {
            if let Some(held) = state.position_mut(ticker) {
                held.quantity = remaining;
            }
            self.open_commission
                .insert(ticker.to_string(), open_commission - entry_share);
        }

        let action = if full {
            TradeAction::Close
        } else {
            TradeAction::PartialClose
        };
        let record = TradeRecord {
            ticker: ticker.to_string(),
            side: position.side,
            signal_type: signal.signal_type,
            action,
            price,
            quantity,
            timestamp: signal.timestamp,
            commission,
            realized_pnl: Some(net_pnl),
        };
        self.journal.record(record.clone());
        self.journal.record_close(ClosedTrade {
            ticker: ticker.to_string(),
            side: position.side,
            entry_timestamp: position.open_timestamp,
            exit_timestamp: signal.timestamp,
            entry_price: position.average_entry_price,
            exit_price: price,
            quantity,
            gross_pnl,
            commission: commission + entry_share,
            net_pnl,
            efficiency: 0.0,
        });
        debug!(ticker, ?action, quantity, price, net_pnl, "exit filled");

        Ok(Some(Fill {
            record,
            closed_position: full,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, SignalType};
    use crate::portfolio::TradingCalendar;
    use crate::test_support::{assert_approx, ts, DEFAULT_EPSILON};

    fn state(cash: f64) -> PortfolioState {
        let calendar = TradingCalendar::new((0..30).map(|i| ts(i).date()).collect());
        PortfolioState::new(cash, calendar, 2)
    }

    fn signal(day: i64, signal_type: SignalType, side: Side, price: f64) -> Signal {
        Signal::new(ts(day), "SPY", signal_type, side, price)
    }

    #[test]
    fn long_round_trip_with_costs() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::default());
        let mut st = state(10_000.0);

        let open = sim
            .execute(&signal(0, SignalType::Buy, Side::Long, 100.0), Intent::Enter { quantity: 10.0 }, &mut st, Some(1))
            .unwrap()
            .unwrap();
        assert_eq!(open.record.action, TradeAction::Open);
        assert_eq!(open.record.price, 100.05);
        assert_approx(st.cash(), 10_000.0 - 1_000.5 - 0.05, 1e-9);

        let close = sim
            .execute(&signal(1, SignalType::Sell, Side::Long, 110.0), Intent::Exit { fraction: 1.0 }, &mut st, Some(1))
            .unwrap()
            .unwrap();
        assert!(close.closed_position);
        assert_eq!(close.record.price, 109.945);
        assert!(st.position("SPY").is_none());

        // gross = (109.945 - 100.05) * 10, net subtracts both commissions.
        let trade = &sim.journal().closed_trades()[0];
        assert_approx(trade.gross_pnl, 98.95, 1e-9);
        assert_approx(trade.net_pnl, 98.95 - 0.1, 1e-9);

        // Proceeds settle two sessions later.
        assert_approx(st.pending_cash(), 1_099.45 - 0.05, 1e-9);
        st.release_settlements(ts(3).date());
        assert_approx(st.cash(), 10_000.0 + 98.85, 1e-9);
    }

    #[test]
    fn short_round_trip_is_symmetric() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::zero_cost());
        let mut st = state(1_000.0);
        sim.execute(&signal(0, SignalType::Sell, Side::Short, 50.0), Intent::Enter { quantity: 10.0 }, &mut st, None)
            .unwrap();
        assert_approx(st.cash(), 500.0, DEFAULT_EPSILON);
        st.mark("SPY", 40.0);
        assert_approx(st.equity(), 1_100.0, DEFAULT_EPSILON);

        sim.execute(&signal(1, SignalType::Buy, Side::Short, 40.0), Intent::Exit { fraction: 1.0 }, &mut st, None)
            .unwrap();
        assert_approx(sim.journal().closed_trades()[0].net_pnl, 100.0, DEFAULT_EPSILON);
        assert_approx(st.net_liquidation_value(), 1_100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn partial_close_keeps_remainder() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::zero_cost());
        let mut st = state(10_000.0);
        sim.execute(&signal(0, SignalType::Buy, Side::Long, 100.0), Intent::Enter { quantity: 10.0 }, &mut st, None)
            .unwrap();
        let fill = sim
            .execute(&signal(1, SignalType::Sell, Side::Long, 120.0), Intent::Exit { fraction: 0.3 }, &mut st, None)
            .unwrap()
            .unwrap();
        assert_eq!(fill.record.action, TradeAction::PartialClose);
        assert!(!fill.closed_position);
        assert_approx(st.position("SPY").unwrap().quantity, 7.0, 1e-9);
        assert_approx(fill.record.realized_pnl.unwrap(), 60.0, 1e-9);
    }

    #[test]
    fn scale_in_averages_entry_price() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::zero_cost());
        let mut st = state(10_000.0);
        sim.execute(&signal(0, SignalType::Buy, Side::Long, 100.0), Intent::Enter { quantity: 10.0 }, &mut st, Some(2))
            .unwrap();
        let fill = sim
            .execute(&signal(1, SignalType::Buy, Side::Long, 110.0), Intent::Enter { quantity: 10.0 }, &mut st, Some(2))
            .unwrap()
            .unwrap();
        assert_eq!(fill.record.action, TradeAction::ScaleIn);
        let pos = st.position("SPY").unwrap();
        assert_approx(pos.average_entry_price, 105.0, 1e-9);
        assert_eq!(pos.entry_count, 2);
    }

    #[test]
    fn opening_past_the_limit_is_a_violation() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::zero_cost());
        let mut st = state(10_000.0);
        let buy = signal(0, SignalType::Buy, Side::Long, 100.0);
        sim.execute(&buy, Intent::Enter { quantity: 1.0 }, &mut st, Some(1)).unwrap();
        let err = sim
            .execute(&buy, Intent::Enter { quantity: 1.0 }, &mut st, Some(1))
            .unwrap_err();
        assert!(matches!(err, InvariantViolationError::ConcurrencyLimit { limit: 1, attempted: 2, .. }));
        assert_eq!(sim.journal().len(), 1);
    }

    #[test]
    fn overclosing_is_a_violation() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::zero_cost());
        let mut st = state(10_000.0);
        sim.execute(&signal(0, SignalType::Buy, Side::Long, 100.0), Intent::Enter { quantity: 1.0 }, &mut st, None)
            .unwrap();
        let err = sim
            .execute(&signal(1, SignalType::Sell, Side::Long, 100.0), Intent::Exit { fraction: -0.5 }, &mut st, None)
            .unwrap_err();
        assert!(matches!(err, InvariantViolationError::NegativeQuantity { .. }));
        assert!(st.position("SPY").is_some());
    }

    #[test]
    fn insufficient_cash_skips() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::default());
        let mut st = state(100.0);
        let fill = sim
            .execute(&signal(0, SignalType::Buy, Side::Long, 100.0), Intent::Enter { quantity: 1.0 }, &mut st, None)
            .unwrap();
        assert!(fill.is_none());
        assert!(sim.journal().is_empty());
        assert_eq!(st.cash(), 100.0);
    }
}
