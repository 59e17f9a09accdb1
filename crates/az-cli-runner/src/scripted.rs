//! In-process [`CommandRunner`] that replays canned results.

use crate::{AzCommand, CommandResult, CommandRunner, OutputLine, RunnerError, SpawnedCommand};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

struct Script {
    prefix: Vec<String>,
    results: VecDeque<CommandResult>,
}

struct SpawnScript {
    prefix: Vec<String>,
    lines: Vec<OutputLine>,
    exit_code: Option<i32>,
}

/// Records every command and answers with the response registered for the
/// longest matching argument prefix. Unmatched commands fail.
///
/// A prefix registered with several results hands them out in order and
/// keeps repeating the last one.
///
/// ```rust,ignore
/// use az_cli_runner::{AzCommand, CommandResult, CommandRunner, ScriptedRunner};
///
/// let runner = ScriptedRunner::new();
/// runner.respond(&["account", "show"], CommandResult::ok("{}"));
///
/// let result = runner.run(&AzCommand::new(["account", "show"]), None).await;
/// assert!(result.success);
/// assert_eq!(runner.call_count(), 1);
/// ```
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<Vec<Script>>,
    spawns: Mutex<Vec<SpawnScript>>,
    calls: Mutex<Vec<AzCommand>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `result`.
    pub fn respond(&self, prefix: &[&str], result: CommandResult) -> &Self {
        self.respond_sequence(prefix, vec![result])
    }

    /// Successful result with `json` as stdout.
    pub fn respond_json(&self, prefix: &[&str], json: &str) -> &Self {
        self.respond(prefix, CommandResult::ok(json))
    }

    /// Failed result with `stderr` as the error text.
    pub fn fail(&self, prefix: &[&str], stderr: &str) -> &Self {
        self.respond(prefix, CommandResult::failure(stderr, Some(1)))
    }

    pub fn respond_sequence(&self, prefix: &[&str], results: Vec<CommandResult>) -> &Self {
        let prefix: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
        let mut scripts = self.scripts.lock();
        scripts.retain(|s| s.prefix != prefix);
        scripts.push(Script {
            prefix,
            results: results.into(),
        });
        drop(scripts);
        self
    }

    /// Lines emitted by a spawned command starting with `prefix`.
    pub fn on_spawn(
        &self,
        prefix: &[&str],
        lines: Vec<OutputLine>,
        exit_code: Option<i32>,
    ) -> &Self {
        self.spawns.lock().push(SpawnScript {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            lines,
            exit_code,
        });
        self
    }

    /// Every command issued through `run` or `spawn`, in order.
    pub fn calls(&self) -> Vec<AzCommand> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of issued commands starting with `prefix`.
    pub fn calls_matching(&self, prefix: &[&str]) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn last_call(&self) -> Option<AzCommand> {
        self.calls.lock().last().cloned()
    }
}

fn as_strs(prefix: &[String]) -> Vec<&str> {
    prefix.iter().map(String::as_str).collect()
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &AzCommand, _timeout: Option<Duration>) -> CommandResult {
        self.calls.lock().push(command.clone());

        let mut scripts = self.scripts.lock();
        let matched = scripts
            .iter_mut()
            .filter(|s| command.starts_with(&as_strs(&s.prefix)))
            .max_by_key(|s| s.prefix.len());

        match matched {
            Some(script) if script.results.len() > 1 => {
                script.results.pop_front().unwrap_or_default()
            }
            Some(script) => script.results.front().cloned().unwrap_or_default(),
            None => CommandResult::failure(
                format!("no scripted response for: {}", command.redacted_line()),
                Some(1),
            ),
        }
    }

    async fn spawn(&self, command: &AzCommand) -> Result<SpawnedCommand, RunnerError> {
        self.calls.lock().push(command.clone());

        let (lines, exit_code) = {
            let spawns = self.spawns.lock();
            let script = spawns
                .iter()
                .filter(|s| command.starts_with(&as_strs(&s.prefix)))
                .max_by_key(|s| s.prefix.len())
                .ok_or_else(|| RunnerError::Spawn {
                    message: format!("no scripted spawn for: {}", command.redacted_line()),
                })?;
            (script.lines.clone(), script.exit_code)
        };

        let (line_tx, line_rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            let _ = line_tx.try_send(line);
        }
        drop(line_tx);

        let (cancel_tx, _cancel_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let _ = exit_tx.send(exit_code);

        Ok(SpawnedCommand::new(line_rx, cancel_tx, exit_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn longest_prefix_wins() {
        let runner = ScriptedRunner::new();
        runner
            .respond_json(&["keyvault"], "[]")
            .respond_json(&["keyvault", "secret", "show"], r#"{"id":"x"}"#);

        let shown = runner
            .run(&AzCommand::new(["keyvault", "secret", "show"]), None)
            .await;
        assert_eq!(shown.output, r#"{"id":"x"}"#);

        let listed = runner.run(&AzCommand::new(["keyvault", "list"]), None).await;
        assert_eq!(listed.output, "[]");
    }

    #[tokio::test]
    async fn unmatched_commands_fail_and_are_recorded() {
        let runner = ScriptedRunner::new();
        let result = runner.run(&AzCommand::new(["logout"]), None).await;
        assert!(!result.success);
        assert!(result.error.contains("no scripted response"));
        assert_eq!(runner.calls_matching(&["logout"]), 1);
    }

    #[tokio::test]
    async fn sequences_repeat_last_result() {
        let runner = ScriptedRunner::new();
        runner.respond_sequence(
            &["account", "show"],
            vec![
                CommandResult::failure("Please run 'az login'", Some(1)),
                CommandResult::ok("{}"),
            ],
        );

        let cmd = AzCommand::new(["account", "show"]);
        assert!(!runner.run(&cmd, None).await.success);
        assert!(runner.run(&cmd, None).await.success);
        assert!(runner.run(&cmd, None).await.success);
        assert_eq!(runner.call_count(), 3);
    }

    #[tokio::test]
    async fn spawn_replays_lines() {
        let runner = ScriptedRunner::new();
        runner.on_spawn(
            &["login"],
            vec![OutputLine::Stderr("line one".into()), OutputLine::Stdout("two".into())],
            Some(0),
        );

        let mut spawned = runner.spawn(&AzCommand::new(["login"])).await.unwrap();
        assert_eq!(spawned.next_line().await.unwrap().text(), "line one");
        assert_eq!(spawned.next_line().await.unwrap().text(), "two");
        assert!(spawned.next_line().await.is_none());
        assert_eq!(spawned.wait().await, Some(0));
    }
}
