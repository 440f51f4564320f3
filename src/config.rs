use std::{env, fmt, path::Path, time::Duration};

use configparser::ini::Ini;
use log::info;
use super_orchestrator::stacked_errors::{Error, Result, StackableErr};

use crate::{
    DEFAULT_CMD_TIMEOUT, DEFAULT_DECIMALS, DEFAULT_RESERVE, DEFAULT_SLEEP, DEFAULT_TX_WAIT,
};

/// The wallet passphrase.
///
/// Redacted from all `Debug` output so it can never leak through logs, traces,
/// or stacked error messages; it is revealed only at the single point where it
/// is written to the signing child process.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: String) -> Self {
        Secret(secret)
    }

    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Who we are on chain. Resolved once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Identity {
    pub chain_id: String,
    pub wallet_name: String,
    pub wallet_address: String,
    pub validator_address: String,
    pub secret: Secret,
}

/// Knobs that drive every cycle. `cmd_timeout` bounds each external call and
/// doubles as the prompt and end-of-stream deadlines of interactive calls,
/// `tx_wait` is the fixed settle pause after each state-changing call.
#[derive(Debug, Clone)]
pub struct Policy {
    pub reserve: f64,
    pub sleep: Duration,
    pub decimals: u32,
    pub cmd_timeout: Duration,
    pub tx_wait: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the node binary, e.x. `archwayd`
    pub daemon: String,
    /// Smallest-unit denomination suffix for amounts, e.x. `uatom`
    pub denom: String,
    pub identity: Identity,
    pub policy: Policy,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

// environment takes precedence over the configuration file
fn lookup(ini: &Ini, env_key: &str, section: &str, key: &str) -> Option<String> {
    match env::var(env_key) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => ini.get(section, key),
    }
}

fn mandatory(ini: &Ini, env_key: &str, section: &str, key: &str) -> Result<String> {
    lookup(ini, env_key, section, key).stack_err(|| {
        format!(
            "unable to find \"{key}\" in the environment (as {env_key}) or in the [{section}] \
             section of the configuration file"
        )
    })
}

fn parsed<T: std::str::FromStr>(val: String, key: &str) -> Result<T>
where
    <T as std::str::FromStr>::Err: fmt::Debug,
{
    val.parse::<T>()
        .map_err(|e| Error::from(format!("could not parse \"{key}\" value \"{val}\": {e:?}")))
}

impl Settings {
    /// Resolves all settings with the precedence: process environment, then
    /// the INI file at `config_path` (sections `[node]` and `[telegram]`),
    /// then defaults. The secret falls back to an interactive hidden prompt
    /// when `need_secret` is set, otherwise it is left empty (the jail checker
    /// never signs anything).
    ///
    /// Missing mandatory fields are a fatal, descriptive error, the intent is
    /// that callers report it and exit before entering any loop.
    pub fn load(config_path: &str, need_secret: bool) -> Result<Self> {
        let mut ini = Ini::new();
        if Path::new(config_path).exists() {
            info!("using configuration file: {config_path}");
            ini.load(config_path)
                .map_err(Error::from)
                .stack_err(|| format!("could not parse configuration file {config_path}"))?;
        } else {
            info!("configuration file does not exist: {config_path}");
        }

        let daemon = mandatory(&ini, "DAEMON", "node", "daemon")?;
        let denom = mandatory(&ini, "DENOM", "node", "denom")?;
        let chain_id = mandatory(&ini, "CHAIN_ID", "node", "chain_id")?;
        let wallet_name = mandatory(&ini, "WALLET_NAME", "node", "wallet_name")?;
        let wallet_address = mandatory(&ini, "WALLET_ADDRESS", "node", "wallet_address")?;
        let validator_address = mandatory(&ini, "VALIDATOR_ADDRESS", "node", "validator_address")?;

        let decimals = match lookup(&ini, "DECIMALS", "node", "decimals") {
            Some(v) => parsed::<u32>(v, "decimals")?,
            None => DEFAULT_DECIMALS,
        };
        if decimals == 0 {
            return Err(Error::from("\"decimals\" must be a positive exponent"))
        }
        let reserve = match lookup(&ini, "RESERVE", "node", "reserve") {
            Some(v) => parsed::<f64>(v, "reserve")?,
            None => DEFAULT_RESERVE,
        };
        if reserve < 0.0 {
            return Err(Error::from(format!(
                "\"reserve\" must be nonnegative, got {reserve}"
            )))
        }
        let sleep = match lookup(&ini, "SLEEP_TIME", "node", "sleep_time") {
            Some(v) => Duration::from_secs(parsed::<u64>(v, "sleep_time")?),
            None => DEFAULT_SLEEP,
        };
        if sleep.is_zero() {
            return Err(Error::from("\"sleep_time\" must be at least one second"))
        }
        let cmd_timeout = match lookup(&ini, "CMD_TIMEOUT", "node", "cmd_timeout") {
            Some(v) => Duration::from_secs(parsed::<u64>(v, "cmd_timeout")?),
            None => DEFAULT_CMD_TIMEOUT,
        };
        let tx_wait = match lookup(&ini, "TX_WAIT", "node", "tx_wait") {
            Some(v) => Duration::from_secs(parsed::<u64>(v, "tx_wait")?),
            None => DEFAULT_TX_WAIT,
        };

        let secret = if need_secret {
            match lookup(&ini, "PASSWORD", "node", "password") {
                Some(v) => Secret::new(v),
                None => Secret::new(
                    rpassword::prompt_password("Enter the wallet passphrase: ")
                        .stack_err(|| "could not read the passphrase from the terminal")?,
                ),
            }
        } else {
            Secret::new(String::new())
        };

        let telegram_token = lookup(&ini, "TELEGRAM_TOKEN", "telegram", "token");
        let telegram_chat_id = lookup(&ini, "TELEGRAM_CHAT_ID", "telegram", "chat_id");

        Ok(Settings {
            daemon,
            denom,
            identity: Identity {
                chain_id,
                wallet_name,
                wallet_address,
                validator_address,
                secret,
            },
            policy: Policy {
                reserve,
                sleep,
                decimals,
                cmd_timeout,
                tx_wait,
            },
            telegram_token,
            telegram_chat_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const INI: &str = "[node]\ndaemon = archwayd\ndenom = uarch\nchain_id = archway-1\n\
                       wallet_name = operator\nwallet_address = archway1wallet\n\
                       validator_address = archwayvaloper1val\nreserve = 1.5\nsleep_time = 30\n\
                       decimals = 6\ncmd_timeout = 10\ntx_wait = 0\npassword = filepass\n\n\
                       [telegram]\ntoken = bot-token\nchat_id = 12345\n";

    // a single test covers file resolution, env precedence, and the
    // missing-mandatory-field error, so that the env mutation cannot race
    // a parallel test
    #[test]
    fn test_resolution_precedence() {
        let path = std::env::temp_dir().join("autodelegator_config_test.ini");
        fs::write(&path, INI).unwrap();
        let path = path.to_str().unwrap();

        let settings = Settings::load(path, true).unwrap();
        assert_eq!(settings.daemon, "archwayd");
        assert_eq!(settings.denom, "uarch");
        assert_eq!(settings.identity.chain_id, "archway-1");
        assert_eq!(settings.identity.wallet_address, "archway1wallet");
        assert_eq!(settings.identity.validator_address, "archwayvaloper1val");
        assert_eq!(settings.identity.secret.reveal(), "filepass");
        assert_eq!(settings.policy.reserve, 1.5);
        assert_eq!(settings.policy.sleep, Duration::from_secs(30));
        assert_eq!(settings.policy.tx_wait, Duration::ZERO);
        assert_eq!(settings.telegram_token.as_deref(), Some("bot-token"));
        assert_eq!(settings.telegram_chat_id.as_deref(), Some("12345"));

        // the environment wins over the file
        env::set_var("RESERVE", "2.25");
        env::set_var("WALLET_ADDRESS", "archway1override");
        let settings = Settings::load(path, true).unwrap();
        assert_eq!(settings.policy.reserve, 2.25);
        assert_eq!(settings.identity.wallet_address, "archway1override");
        env::remove_var("RESERVE");
        env::remove_var("WALLET_ADDRESS");

        // the secret never appears in debug formatting
        let dbg = format!("{settings:?}");
        assert!(!dbg.contains("filepass"));
        assert!(dbg.contains("<redacted>"));

        // a missing mandatory field is a descriptive error, not a panic
        let e = Settings::load("/nonexistent/autodelegator.ini", false).unwrap_err();
        assert!(format!("{e:?}").contains("daemon"));
    }
}
