use super_orchestrator::stacked_errors::{Result, StackableErr};
use tokio::{sync::watch, time::sleep};

use crate::{chain, config::Settings, decimal_to_shares, notify::Notifier, shares_to_decimal};

/// Shares the wallet could re-delegate: the post-distribution balance minus
/// the reserve. Negative when the balance does not cover the reserve.
pub fn proposed_delegation(balance_shares: u128, reserve: f64, decimals: u32) -> i128 {
    balance_shares as i128 - decimal_to_shares(reserve, decimals)
}

/// The delegation cycle engine. Owns no chain state across cycles, everything
/// is re-queried from the node each pass.
pub struct AutoDelegator<'a> {
    settings: &'a Settings,
    notifier: &'a Notifier,
}

impl<'a> AutoDelegator<'a> {
    pub fn new(settings: &'a Settings, notifier: &'a Notifier) -> Self {
        AutoDelegator { settings, notifier }
    }

    /// One full delegation cycle: query the current delegation, withdraw
    /// rewards and commission, query the post-distribution balance, and
    /// re-delegate whatever exceeds the reserve. Every step is echoed through
    /// the notifier. The first failing step aborts the cycle, later steps are
    /// not attempted.
    ///
    /// The pauses after each transaction are a settle heuristic, not a
    /// finality check. A delayed transaction only shifts the next balance
    /// snapshot, since each cycle re-queries live state.
    pub async fn cycle(&self) -> Result<()> {
        let s = self.settings;
        let decimals = s.policy.decimals;
        self.notifier.send("Start Delegation Cycle!").await;

        let curr_delegation = chain::get_delegations(s)
            .await
            .stack_err(|| "could not query the current delegation")?;
        self.notifier
            .send(&format!(
                " - Current Delegation: {}",
                shares_to_decimal(curr_delegation, decimals)
            ))
            .await;

        let txhash = chain::withdraw_rewards(s)
            .await
            .stack_err(|| "reward withdrawal failed")?;
        self.notifier
            .send(&format!(" - Distribution Tx Hash: {txhash}"))
            .await;
        sleep(s.policy.tx_wait).await;

        let txhash = chain::withdraw_commission(s)
            .await
            .stack_err(|| "commission withdrawal failed")?;
        self.notifier
            .send(&format!(" - Commission Tx Hash: {txhash}"))
            .await;
        sleep(s.policy.tx_wait).await;

        let balance = chain::get_balance(s)
            .await
            .stack_err(|| "could not query the post-distribution balance")?;
        self.notifier
            .send(&format!(
                " - Current Balance ( post distribution ): {}",
                shares_to_decimal(balance, decimals)
            ))
            .await;

        let proposed = proposed_delegation(balance, s.policy.reserve, decimals);
        if proposed > 0 {
            let proposed = proposed as u128;
            self.notifier
                .send(&format!(
                    " - Proposed Amount for Delegation: {} ( {proposed} shares )",
                    shares_to_decimal(proposed, decimals)
                ))
                .await;
            let txhash = chain::delegate(s, proposed)
                .await
                .stack_err(|| "delegation failed")?;
            self.notifier
                .send(&format!(" - Delegation Tx Hash: {txhash}"))
                .await;
            sleep(s.policy.tx_wait).await;

            let new_delegation = chain::get_delegations(s)
                .await
                .stack_err(|| "could not query the new delegation")?;
            self.notifier
                .send(&format!(
                    " - New Delegation: {} ( Delta: {} )",
                    shares_to_decimal(new_delegation, decimals),
                    shares_to_decimal(new_delegation, decimals)
                        - shares_to_decimal(curr_delegation, decimals)
                ))
                .await;
        } else {
            self.notifier
                .send(&format!(
                    " - Balance of {} does not exceed the reserve amount {} for delegation - \
                     Skipping...",
                    shares_to_decimal(balance, decimals),
                    s.policy.reserve
                ))
                .await;
        }
        self.notifier.send("End Delegation Cycle").await;
        Ok(())
    }

    /// Runs cycles until `shutdown` observes `true`. A failed cycle is
    /// reported through the notifier (the console path is guaranteed) and the
    /// loop proceeds to its sleep, the process does not crash. The in-flight
    /// cycle always completes before shutdown takes effect.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                return Ok(())
            }
            if let Err(e) = self.cycle().await {
                self.notifier
                    .send(&format!("Delegation Cycle Failed: {e:?}"))
                    .await;
            }
            self.notifier
                .send(&format!(
                    "Sleeping {} Seconds\n",
                    self.settings.policy.sleep.as_secs()
                ))
                .await;
            tokio::select! {
                _ = sleep(self.settings.policy.sleep) => (),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposed_delegation_threshold() {
        // balance above the reserve: delegate exactly the difference
        assert_eq!(proposed_delegation(2_500_000, 1.0, 6), 1_500_000);
        // balance below the reserve: negative, the engine must skip
        assert_eq!(proposed_delegation(500_000, 1.0, 6), -500_000);
        // exactly at the reserve: zero is not `> 0`, the engine must skip
        assert_eq!(proposed_delegation(1_000_000, 1.0, 6), 0);
        assert_eq!(proposed_delegation(0, 0.0, 6), 0);
        assert_eq!(proposed_delegation(1, 0.0, 6), 1);
    }
}
