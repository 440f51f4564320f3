use autodelegator::{
    config::Settings, jail::JailMonitor, log_init, notify::Notifier, shutdown_signal,
    super_orchestrator::stacked_errors::Result, Args,
};
use clap::Parser;
use log::error;

#[tokio::main]
async fn main() -> Result<()> {
    log_init();
    let args = Args::parse();
    let config_path = args.config.as_deref().unwrap_or("jail_check.ini");

    // the monitor is read-only and never signs, so the secret is not resolved
    // and no passphrase prompt can appear
    let settings = match Settings::load(config_path, false) {
        Ok(settings) => settings,
        Err(e) => {
            error!("could not resolve the configuration: {e:?}");
            std::process::exit(1);
        }
    };

    let notifier = Notifier::new(
        settings.telegram_token.clone(),
        settings.telegram_chat_id.clone(),
    );

    let shutdown = shutdown_signal();
    let monitor = JailMonitor::new(&settings, &notifier);
    monitor.run(shutdown).await?;

    notifier.send("Jail Check shutting down").await;
    Ok(())
}
