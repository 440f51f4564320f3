use super_orchestrator::stacked_errors::{Error, Result, StackableErr};

use crate::{
    config::Settings,
    expect::{run_interactive, run_query},
    parse::{quoted_val, separated_val},
};

/// The secret-entry prompt the node binary emits before signing
pub const KEYRING_PROMPT: &[u8] = b"Enter keyring passphrase:";

/// Parses the `shares` field of a delegations query, a quoted
/// decimal-as-string. The fractional part is truncated.
pub fn parse_shares(text: &str) -> Result<u128> {
    let val = quoted_val(text, "shares")?;
    let integer = val.split('.').next().stack_err(|| "empty shares value")?;
    integer
        .parse::<u128>()
        .stack_err(|| format!("could not parse shares value \"{val}\" as an integer"))
}

/// Parses the `amount` field of a bank balances query as raw shares
pub fn parse_amount(text: &str) -> Result<u128> {
    let val = quoted_val(text, "amount")?;
    val.parse::<u128>()
        .stack_err(|| format!("could not parse amount value \"{val}\" as an integer"))
}

/// Parses the `txhash` field a state-changing command reports on completion
pub fn parse_txhash(text: &str) -> Result<String> {
    let val = separated_val(text, "txhash", ":")?;
    if val.is_empty() {
        return Err(Error::from("txhash line had an empty value"))
    }
    Ok(val.to_owned())
}

/// Parses the `jailed` field of a validator status query. Only the literal
/// strings `true` and `false` are accepted, anything else is a parse error.
pub fn parse_jailed(text: &str) -> Result<bool> {
    match separated_val(text, "jailed", ":")? {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::from(format!(
            "expected \"jailed\" to be \"true\" or \"false\", got \"{other}\""
        ))),
    }
}

/// Current shares delegated to the configured validator
pub async fn get_delegations(settings: &Settings) -> Result<u128> {
    let out = run_query(
        &format!(
            "{} q staking delegations-to {} --chain-id={}",
            settings.daemon, settings.identity.validator_address, settings.identity.chain_id
        ),
        settings.policy.cmd_timeout,
    )
    .await
    .stack()?;
    parse_shares(&out)
}

/// Spendable wallet balance in raw shares
pub async fn get_balance(settings: &Settings) -> Result<u128> {
    let out = run_query(
        &format!(
            "{} q bank balances {}",
            settings.daemon, settings.identity.wallet_address
        ),
        settings.policy.cmd_timeout,
    )
    .await
    .stack()?;
    parse_amount(&out)
}

async fn withdraw(settings: &Settings, commission: bool) -> Result<String> {
    let commission_flag = if commission { " --commission" } else { "" };
    let cmd = format!(
        "{} tx distribution withdraw-rewards {} --chain-id={} --from {}{commission_flag} -y",
        settings.daemon,
        settings.identity.validator_address,
        settings.identity.chain_id,
        settings.identity.wallet_name
    );
    let out = run_interactive(
        &cmd,
        KEYRING_PROMPT,
        settings.identity.secret.reveal(),
        settings.policy.cmd_timeout,
        settings.policy.cmd_timeout,
    )
    .await
    .stack()?;
    parse_txhash(&out)
}

/// Withdraws accrued staking rewards into the wallet, returning the txhash
pub async fn withdraw_rewards(settings: &Settings) -> Result<String> {
    withdraw(settings, false).await
}

/// Withdraws accrued validator commission into the wallet, returning the
/// txhash
pub async fn withdraw_commission(settings: &Settings) -> Result<String> {
    withdraw(settings, true).await
}

/// Delegates `shares` of the configured denomination to the validator,
/// returning the txhash
pub async fn delegate(settings: &Settings, shares: u128) -> Result<String> {
    let cmd = format!(
        "{} tx staking delegate {} {shares}{} --from {} --chain-id {} -y",
        settings.daemon,
        settings.identity.validator_address,
        settings.denom,
        settings.identity.wallet_name,
        settings.identity.chain_id
    );
    let out = run_interactive(
        &cmd,
        KEYRING_PROMPT,
        settings.identity.secret.reveal(),
        settings.policy.cmd_timeout,
        settings.policy.cmd_timeout,
    )
    .await
    .stack()?;
    parse_txhash(&out)
}

/// Whether the network reports the validator as jailed
pub async fn get_jailed(settings: &Settings) -> Result<bool> {
    let out = run_query(
        &format!(
            "{} query staking validator {}",
            settings.daemon, settings.identity.validator_address
        ),
        settings.policy.cmd_timeout,
    )
    .await
    .stack()?;
    parse_jailed(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shares() {
        let out = "delegation_responses:\n- delegation:\n    delegator_address: \
                   archway1wallet\n    shares: \"2000000.000000000000000000\"\n    \
                   validator_address: archwayvaloper1val\n";
        assert_eq!(parse_shares(out).unwrap(), 2_000_000);
        assert_eq!(parse_shares("shares: \"17\"\n").unwrap(), 17);
        assert!(parse_shares("pagination:\n  total: \"0\"\n").is_err());
    }

    #[test]
    fn test_parse_amount() {
        let out = "balances:\n- amount: \"2500000\"\n  denom: utest\n";
        assert_eq!(parse_amount(out).unwrap(), 2_500_000);
        assert!(parse_amount("balances: []\n").is_err());
        assert!(parse_amount("amount: \"not a number\"\n").is_err());
    }

    #[test]
    fn test_parse_txhash() {
        let out = "code: 0\nevents: []\nraw_log: '[]'\ntxhash: \
                   9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B\n";
        assert_eq!(
            parse_txhash(out).unwrap(),
            "9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B"
        );
        // a node error page instead of tx output must be an explicit error
        assert!(parse_txhash("Error: rpc error: code = NotFound\n").is_err());
    }

    #[test]
    fn test_parse_jailed_is_strict() {
        assert!(parse_jailed("commission: ...\njailed: true\nstatus: BOND_STATUS_BONDED\n").unwrap());
        assert!(!parse_jailed("jailed: false\n").unwrap());
        assert!(parse_jailed("jailed: maybe\n").is_err());
        assert!(parse_jailed("status: BOND_STATUS_BONDED\n").is_err());
    }
}
