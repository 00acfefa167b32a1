use async_trait::async_trait;
use std::io::{BufRead, IsTerminal, Write};
use tracing::warn;

use super::plan::PlannedStep;

/// Capability asked before every destructive action
///
/// Only an explicit affirmative answer lets the action run; anything else
/// declines it and the run continues with the remaining actions.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, step: &PlannedStep) -> bool;
}

/// Asks on the terminal. Declines when stdin is not a terminal.
pub struct TerminalConfirm;

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, step: &PlannedStep) -> bool {
        let mut prompt = format!("\nAbout to run destructive action {}\n", step.action);
        for finding in &step.addresses {
            prompt.push_str(&format!("  resolves: {}\n", finding));
        }
        prompt.push_str(&format!("  command:  {}\n", step.action.command()));
        prompt.push_str("Proceed? [y/N] ");

        let answer = tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            if !stdin.is_terminal() {
                return None;
            }
            eprint!("{}", prompt);
            std::io::stderr().flush().ok()?;
            let mut line = String::new();
            stdin.lock().read_line(&mut line).ok()?;
            Some(line)
        })
        .await;

        match answer {
            Ok(Some(line)) => is_affirmative(&line),
            Ok(None) => {
                warn!("stdin is not a terminal, declining {}", step.action);
                false
            }
            Err(e) => {
                warn!("Confirmation prompt failed: {}", e);
                false
            }
        }
    }
}

/// Approves every destructive action (`--approve-deletions`)
pub struct PreApproved;

#[async_trait]
impl Confirm for PreApproved {
    async fn confirm(&self, _step: &PlannedStep) -> bool {
        true
    }
}

/// Declines every destructive action (`--non-interactive`)
pub struct DenyAll;

#[async_trait]
impl Confirm for DenyAll {
    async fn confirm(&self, _step: &PlannedStep) -> bool {
        false
    }
}

#[cfg(test)]
use std::sync::Mutex;

/// Replays scripted answers and records what was asked
#[cfg(test)]
pub struct Scripted {
    answers: Mutex<Vec<bool>>,
    pub asked: Mutex<Vec<String>>,
}

#[cfg(test)]
impl Scripted {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().rev().collect()),
            asked: Mutex::new(vec![]),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Confirm for Scripted {
    async fn confirm(&self, step: &PlannedStep) -> bool {
        self.asked.lock().unwrap().push(step.action.to_string());
        self.answers.lock().unwrap().pop().unwrap_or(false)
    }
}
