use autodelegator::{
    config::Settings, cycle::AutoDelegator, log_init, notify::Notifier, shutdown_signal,
    super_orchestrator::stacked_errors::Result, Args,
};
use clap::Parser;
use log::error;

#[tokio::main]
async fn main() -> Result<()> {
    log_init();
    let args = Args::parse();
    let config_path = args.config.as_deref().unwrap_or("config.ini");

    // configuration errors are fatal by design, the operator must fix the
    // configuration and restart
    let settings = match Settings::load(config_path, true) {
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
    notifier
        .send(&format!(
            "Hello from the Autodelegation Bot! ( validator {} )",
            settings.identity.validator_address
        ))
        .await;

    let shutdown = shutdown_signal();
    let bot = AutoDelegator::new(&settings, &notifier);
    bot.run(shutdown).await?;

    notifier.send("Autodelegation Bot shutting down").await;
    Ok(())
}
