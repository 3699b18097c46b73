//! Result export: JSON manifest, CSV trade tapes, artifact directories.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use replaylab_core::results::SCHEMA_VERSION;
use replaylab_core::{ClosedTrade, TradeRecord};

use crate::runner::RunOutcome;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunOutcome` to pretty JSON.
pub fn export_json(outcome: &RunOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("failed to serialize RunOutcome to JSON")
}

/// Deserialize a `RunOutcome` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunOutcome> {
    let outcome: RunOutcome =
        serde_json::from_str(json).context("failed to deserialize RunOutcome from JSON")?;
    if outcome.results.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            outcome.results.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(outcome)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the trade journal as CSV, one row per fill.
///
/// Columns: timestamp, ticker, side, signal_type, action, price, quantity,
/// commission, realized_pnl (empty on opening fills)
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "ticker",
        "side",
        "signal_type",
        "action",
        "price",
        "quantity",
        "commission",
        "realized_pnl",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.timestamp.to_string(),
            &t.ticker,
            &t.side.to_string(),
            &t.signal_type.to_string(),
            &format!("{:?}", t.action),
            &format!("{:.6}", t.price),
            &format!("{:.6}", t.quantity),
            &format!("{:.2}", t.commission),
            &t.realized_pnl.map(|p| format!("{p:.2}")).unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

/// Export completed round trips as CSV.
pub fn export_closed_trades_csv(trades: &[ClosedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "side",
        "entry_timestamp",
        "exit_timestamp",
        "entry_price",
        "exit_price",
        "quantity",
        "gross_pnl",
        "commission",
        "net_pnl",
        "return_pct",
        "hours_held",
        "efficiency",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.ticker,
            &t.side.to_string(),
            &t.entry_timestamp.to_string(),
            &t.exit_timestamp.to_string(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.exit_price),
            &format!("{:.6}", t.quantity),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.net_pnl),
            &format!("{:.4}", t.return_pct() * 100.0),
            &format!("{:.2}", t.hours_held()),
            &format!("{:.2}", t.efficiency),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one run.
///
/// Creates `{run_id[..16]}/` under `output_dir` containing:
/// - `manifest.json`: the full `RunOutcome`
/// - `trades.csv`: the fill journal
/// - `closed_trades.csv`: round trips
///
/// The directory name depends only on the run config, so re-saving the same
/// run overwrites its previous artifacts. Returns the created directory.
pub fn save_artifacts(outcome: &RunOutcome, output_dir: &Path) -> Result<PathBuf> {
    let dirname: String = outcome.run_id.chars().take(16).collect();
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(outcome)?)?;
    std::fs::write(
        run_dir.join("trades.csv"),
        export_trades_csv(&outcome.results.trades)?,
    )?;
    std::fs::write(
        run_dir.join("closed_trades.csv"),
        export_closed_trades_csv(&outcome.results.closed_trades)?,
    )?;
    Ok(run_dir)
}

/// Load a `RunOutcome` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<RunOutcome> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::runner::Runner;

    fn sample_outcome() -> RunOutcome {
        let config = RunConfig::from_toml_str(
            r#"
            [backtest]
            tickers = ["SPY"]
            start = "2023-01-02T00:00:00"
            end = "2023-12-29T00:00:00"
            strategy = { type = "sma-crossover", parameters = { short = 5, long = 20 } }

            [data]
            source = "synthetic"
            seed = 5
            "#,
        )
        .unwrap();
        Runner::new().unwrap().run(&config).unwrap()
    }

    #[test]
    fn json_roundtrip() {
        let outcome = sample_outcome();
        let json = export_json(&outcome).unwrap();
        assert_eq!(import_json(&json).unwrap(), outcome);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut outcome = sample_outcome();
        outcome.results.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&outcome).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn csv_trades_have_one_row_per_fill() {
        let outcome = sample_outcome();
        assert!(!outcome.results.trades.is_empty());
        let csv = export_trades_csv(&outcome.results.trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), outcome.results.trades.len() + 1);
        assert!(lines[0].starts_with("timestamp,ticker,side"));
        assert!(lines[1].contains("SPY,LONG,buy,Open"));
    }

    #[test]
    fn csv_closed_trades_end_with_efficiency() {
        let outcome = sample_outcome();
        let csv = export_closed_trades_csv(&outcome.results.closed_trades).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().ends_with(",hours_held,efficiency"));
        for (line, trade) in lines.zip(&outcome.results.closed_trades) {
            assert!(line.ends_with(&format!(",{:.2}", trade.efficiency)));
            assert!((0.0..=100.0).contains(&trade.efficiency));
        }
    }

    #[test]
    fn csv_empty_trades() {
        let csv = export_closed_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.contains("net_pnl"));
    }

    #[test]
    fn save_load_artifacts_roundtrip() {
        let outcome = sample_outcome();
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&outcome, dir.path()).unwrap();

        assert!(run_dir.join("manifest.json").exists());
        assert!(run_dir.join("trades.csv").exists());
        assert!(run_dir.join("closed_trades.csv").exists());
        assert_eq!(load_artifacts(&run_dir).unwrap(), outcome);

        // Same run, same directory.
        assert_eq!(save_artifacts(&outcome, dir.path()).unwrap(), run_dir);
    }
}
