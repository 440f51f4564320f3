use log::warn;
use reqwest::Client;

/// Fans messages out to the console and, when configured, a Telegram bot.
///
/// The console is the guaranteed channel. Telegram delivery is best effort, a
/// failure there is logged and never affects the cycle.
pub struct Notifier {
    client: Client,
    telegram: Option<(String, String)>,
}

impl Notifier {
    pub fn new(telegram_token: Option<String>, telegram_chat_id: Option<String>) -> Self {
        Notifier {
            client: Client::new(),
            telegram: telegram_token.zip(telegram_chat_id),
        }
    }

    pub async fn send(&self, msg: &str) {
        println!("{msg}");
        if let Some((token, chat_id)) = &self.telegram {
            let url = format!("https://api.telegram.org/bot{token}/sendMessage");
            let res = self
                .client
                .post(&url)
                .query(&[("chat_id", chat_id.as_str()), ("text", msg)])
                .send()
                .await;
            match res {
                Ok(resp) if !resp.status().is_success() => {
                    warn!("telegram notification returned status {}", resp.status())
                }
                Err(e) => warn!("telegram notification failed: {e}"),
                _ => (),
            }
        }
    }
}
