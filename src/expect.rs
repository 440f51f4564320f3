use std::{process::Stdio, time::Duration};

use log::debug;
use super_orchestrator::{
    stacked_errors::{Error, Result, StackableErr},
    Command,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process,
    time::{timeout, Instant},
};

/// Runs a read-only query command to completion, returning its stdout.
///
/// Nonzero exit status and overrunning `deadline` are both explicit errors,
/// they are never swallowed into an empty result.
pub async fn run_query(cmd_with_args: &str, deadline: Duration) -> Result<String> {
    debug!("running query \"{cmd_with_args}\"");
    let comres = timeout(deadline, Command::new(cmd_with_args).run_to_completion())
        .await
        .map_err(|_| Error::timeout())
        .stack_err(|| format!("query \"{cmd_with_args}\" did not finish within {deadline:?}"))?
        .stack_err(|| format!("query \"{cmd_with_args}\" could not be run"))?;
    comres
        .assert_success()
        .stack_err(|| format!("query \"{cmd_with_args}\" returned an unsuccessful status"))?;
    Ok(comres.stdout_as_utf8().stack()?.to_owned())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Runs a state-changing command that stops at an interactive secret prompt.
///
/// This is an explicit two-phase protocol. Phase 1 accumulates the child's
/// stdout and stderr until the literal `prompt` byte pattern appears, failing
/// with a timeout error if `prompt_deadline` lapses first. Phase 2 writes
/// `secret` plus a line terminator to the child's stdin exactly once, closes
/// stdin, and collects the rest of the output until end-of-stream and process
/// exit, failing with a timeout error if `process_deadline` lapses first.
///
/// The returned buffer holds only what the child emitted, the secret is never
/// copied into it or into any error message. The child is killed if this
/// future fails or is dropped early.
pub async fn run_interactive(
    cmd_with_args: &str,
    prompt: &[u8],
    secret: &str,
    prompt_deadline: Duration,
    process_deadline: Duration,
) -> Result<String> {
    debug!("running interactive \"{cmd_with_args}\"");
    let mut parts = cmd_with_args.split_whitespace();
    let program = parts
        .next()
        .stack_err(|| "run_interactive() called with an empty command")?;
    let mut child = process::Command::new(program)
        .args(parts)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .stack_err(|| format!("failed to spawn \"{cmd_with_args}\""))?;
    let mut stdin = child.stdin.take().stack_err(|| "child stdin was not captured")?;
    let mut stdout = child.stdout.take().stack_err(|| "child stdout was not captured")?;
    let mut stderr = child.stderr.take().stack_err(|| "child stderr was not captured")?;

    let mut collected: Vec<u8> = vec![];
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let mut stdout_open = true;
    let mut stderr_open = true;

    // phase 1: wait for the prompt on either stream
    let start = Instant::now();
    while !contains(&collected, prompt) {
        if !stdout_open && !stderr_open {
            return Err(Error::from(format!(
                "\"{cmd_with_args}\" closed its output without emitting the expected prompt, \
                 output was: \"{}\"",
                String::from_utf8_lossy(&collected)
            )))
        }
        let remaining = match prompt_deadline.checked_sub(start.elapsed()) {
            Some(d) => d,
            None => {
                return Err(Error::timeout()).stack_err(|| {
                    format!(
                        "\"{cmd_with_args}\" did not emit the expected prompt within \
                         {prompt_deadline:?}"
                    )
                })
            }
        };
        let read = timeout(remaining, async {
            tokio::select! {
                r = stdout.read(&mut out_buf), if stdout_open => (true, r),
                r = stderr.read(&mut err_buf), if stderr_open => (false, r),
            }
        })
        .await;
        let (from_stdout, res) = match read {
            Ok(o) => o,
            Err(_) => {
                return Err(Error::timeout()).stack_err(|| {
                    format!(
                        "\"{cmd_with_args}\" did not emit the expected prompt within \
                         {prompt_deadline:?}"
                    )
                })
            }
        };
        let n = res.stack_err(|| format!("error reading the output of \"{cmd_with_args}\""))?;
        if n == 0 {
            if from_stdout {
                stdout_open = false;
            } else {
                stderr_open = false;
            }
        } else if from_stdout {
            collected.extend_from_slice(&out_buf[..n]);
        } else {
            collected.extend_from_slice(&err_buf[..n]);
        }
    }

    // phase 2: answer the prompt exactly once and collect to end-of-stream
    stdin
        .write_all(secret.as_bytes())
        .await
        .stack_err(|| format!("could not write the secret to \"{cmd_with_args}\""))?;
    stdin
        .write_all(b"\n")
        .await
        .stack_err(|| format!("could not write the secret to \"{cmd_with_args}\""))?;
    stdin
        .shutdown()
        .await
        .stack_err(|| format!("could not close the stdin of \"{cmd_with_args}\""))?;
    drop(stdin);

    let start = Instant::now();
    while stdout_open || stderr_open {
        let remaining = match process_deadline.checked_sub(start.elapsed()) {
            Some(d) => d,
            None => {
                return Err(Error::timeout()).stack_err(|| {
                    format!(
                        "\"{cmd_with_args}\" did not reach end-of-stream within \
                         {process_deadline:?}"
                    )
                })
            }
        };
        let read = timeout(remaining, async {
            tokio::select! {
                r = stdout.read(&mut out_buf), if stdout_open => (true, r),
                r = stderr.read(&mut err_buf), if stderr_open => (false, r),
            }
        })
        .await;
        let (from_stdout, res) = match read {
            Ok(o) => o,
            Err(_) => {
                return Err(Error::timeout()).stack_err(|| {
                    format!(
                        "\"{cmd_with_args}\" did not reach end-of-stream within \
                         {process_deadline:?}"
                    )
                })
            }
        };
        let n = res.stack_err(|| format!("error reading the output of \"{cmd_with_args}\""))?;
        if n == 0 {
            if from_stdout {
                stdout_open = false;
            } else {
                stderr_open = false;
            }
        } else if from_stdout {
            collected.extend_from_slice(&out_buf[..n]);
        } else {
            collected.extend_from_slice(&err_buf[..n]);
        }
    }

    let remaining = process_deadline.saturating_sub(start.elapsed());
    let status = timeout(remaining, child.wait())
        .await
        .map_err(|_| Error::timeout())
        .stack_err(|| format!("\"{cmd_with_args}\" did not exit within {process_deadline:?}"))?
        .stack_err(|| format!("error waiting on \"{cmd_with_args}\""))?;
    if !status.success() {
        return Err(Error::from(format!(
            "\"{cmd_with_args}\" exited with {status}, output was: \"{}\"",
            String::from_utf8_lossy(&collected)
        )))
    }
    Ok(String::from_utf8_lossy(&collected).into_owned())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const PROMPT: &[u8] = b"Enter keyring passphrase:";

    fn write_script(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("autodelegator_expect_{name}.sh"));
        fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn test_query_success_and_failure() {
        let out = run_query("echo jailed: false", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(out.contains("jailed: false"));
        // nonzero exit must surface as an error
        assert!(run_query("false", Duration::from_secs(5)).await.is_err());
        // timeout must surface as an error within the bound
        let start = Instant::now();
        let res = run_query("sleep 30", Duration::from_millis(300)).await;
        assert!(res.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_interactive_prompt_and_hash() {
        let script = write_script(
            "happy",
            "printf 'Enter keyring passphrase:'\nread pw\necho ''\necho 'txhash: \
             9F86D081884C7D659A2FEAA0C55AD015'\n",
        );
        let out = run_interactive(
            &format!("sh {script}"),
            PROMPT,
            "hunter2",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(out.contains("txhash: 9F86D081884C7D659A2FEAA0C55AD015"));
        // the secret must never end up in the returned buffer
        assert!(!out.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_interactive_prompt_timeout() {
        let script = write_script("silent", "sleep 30\n");
        let start = Instant::now();
        let res = run_interactive(
            &format!("sh {script}"),
            PROMPT,
            "hunter2",
            Duration::from_millis(300),
            Duration::from_secs(5),
        )
        .await;
        let e = res.unwrap_err();
        // fails within the timeout bound, not at process exit
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(format!("{e:?}").contains("did not emit the expected prompt"));
    }

    #[tokio::test]
    async fn test_interactive_early_exit() {
        let script = write_script("early", "echo 'Error: keyring is unavailable'\nexit 1\n");
        let e = run_interactive(
            &format!("sh {script}"),
            PROMPT,
            "hunter2",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(format!("{e:?}").contains("without emitting the expected prompt"));
    }
}
