use std::time::Duration;

use clap::Parser;
use tokio::{signal, sync::watch, task};

pub const DEFAULT_SLEEP: Duration = Duration::from_secs(600);
pub const DEFAULT_RESERVE: f64 = 0.1;
pub const DEFAULT_DECIMALS: u32 = 6;
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TX_WAIT: Duration = Duration::from_secs(10);

/// Periodic validator operations driver
#[derive(Parser, Debug, Clone)]
#[command(about)]
pub struct Args {
    /// Configuration file, defaults to `config.ini` (`jail_check.ini` for the
    /// jail checker)
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Initializes `env_logger` with an info-level default, overridable through
/// `RUST_LOG`
pub fn log_init() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Returns a receiver that observes `true` after ctrl-c is received. The
/// signal is polled from a dedicated task, so an interrupt arriving mid-cycle
/// does not kill the process abruptly; the driving loop exits at its next
/// suspension point with the in-flight step completed.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    task::spawn(async move {
        // if signal installation itself fails there is no way to ever observe
        // an interrupt, treat it the same as one
        let _ = signal::ctrl_c().await;
        let _ = tx.send(true);
    });
    rx
}

/// Converts integer shares to the human decimal denomination, dividing by
/// `10^decimals`
pub fn shares_to_decimal(shares: u128, decimals: u32) -> f64 {
    (shares as f64) / 10f64.powi(decimals as i32)
}

/// Converts a decimal amount to shares, truncating toward zero. Negative
/// inputs are not rejected, they propagate into comparisons.
pub fn decimal_to_shares(amount: f64, decimals: u32) -> i128 {
    (amount * 10f64.powi(decimals as i32)) as i128
}

#[test]
fn test_unit_conversions() {
    assert_eq!(decimal_to_shares(1.0, 6), 1_000_000);
    assert_eq!(decimal_to_shares(1.5, 6), 1_500_000);
    assert_eq!(decimal_to_shares(0.1, 6), 100_000);
    assert_eq!(decimal_to_shares(0.0, 6), 0);
    assert_eq!(decimal_to_shares(-0.5, 6), -500_000);
    // truncation, not rounding
    assert_eq!(decimal_to_shares(0.9999994, 6), 999_999);
    assert_eq!(shares_to_decimal(2_500_000, 6), 2.5);
    assert_eq!(shares_to_decimal(0, 6), 0.0);
    assert_eq!(shares_to_decimal(1, 18), 1.0e-18);
}

#[test]
fn test_round_trip_truncation_bound() {
    for x in [0.0, 0.1, 1.0, 2.5, 0.333333333, 600.25] {
        let shares = decimal_to_shares(x, 6);
        assert!(shares >= 0);
        let back = shares_to_decimal(shares as u128, 6);
        let diff = x - back;
        assert!(diff >= 0.0);
        assert!(diff <= 1.0e-6);
    }
}
