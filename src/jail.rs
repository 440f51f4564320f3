use super_orchestrator::stacked_errors::{Result, StackableErr};
use tokio::{sync::watch, time::sleep};

use crate::{chain, config::Settings, notify::Notifier};

/// Read-only polling loop that alerts while the validator is jailed. Never
/// mutates anything, its only side effect is notification.
pub struct JailMonitor<'a> {
    settings: &'a Settings,
    notifier: &'a Notifier,
}

impl<'a> JailMonitor<'a> {
    pub fn new(settings: &'a Settings, notifier: &'a Notifier) -> Self {
        JailMonitor { settings, notifier }
    }

    /// One poll: emits exactly one notification if the validator is reported
    /// jailed, nothing otherwise
    pub async fn check(&self) -> Result<()> {
        let jailed = chain::get_jailed(self.settings)
            .await
            .stack_err(|| "could not query the validator status")?;
        if jailed {
            self.notifier
                .send(&format!(
                    "Validator {} is jailed!",
                    self.settings.identity.validator_address
                ))
                .await;
        }
        Ok(())
    }

    /// Polls until `shutdown` observes `true`. Failed polls are reported and
    /// the loop keeps going.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                return Ok(())
            }
            if let Err(e) = self.check().await {
                self.notifier
                    .send(&format!("Jail Check Failed: {e:?}"))
                    .await;
            }
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
