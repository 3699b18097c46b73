//! Domain types for ReplayLab

pub mod bar;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, OhlcvSeries, PriceField};
pub use position::Position;
pub use signal::{Metadata, Side, Signal, SignalKey, SignalType};
pub use trade::{ClosedTrade, TradeAction, TradeRecord};

/// Ticker symbol
pub type Ticker = String;
