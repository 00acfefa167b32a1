use chrono::{DateTime, Utc};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Color, Table};
use serde::Serialize;

use super::diff::{Audit, Finding, Severity, Unverifiable};
use super::error::EngineError;
use super::executor::{Outcome, StepResult};
use super::plan::Plan;

/// One finding as shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLine {
    pub severity: Severity,
    pub finding: &'static str,
    pub resource: String,
    pub detail: String,
    pub hint: String,
    /// Equivalent control-plane command, when the finding has an automatic remedy
    pub command: Option<String>,
}

impl ReportLine {
    fn new(finding: &Finding, plan: &Plan) -> Self {
        let commands: Vec<String> = plan
            .steps
            .iter()
            .filter(|s| s.addresses.contains(finding))
            .map(|s| s.action.command())
            .collect();
        Self {
            severity: finding.severity(),
            finding: finding.label(),
            resource: finding.resource(),
            detail: finding.to_string(),
            hint: finding.hint(),
            command: (!commands.is_empty()).then(|| commands.join(" && ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionLine {
    pub stage: u8,
    pub action: String,
    pub destructive: bool,
    pub command: String,
    /// `None` for a dry run
    pub outcome: Option<Outcome>,
}

/// Result of a `verify` or `fix` run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub project_id: String,
    pub project_number: u64,
    pub findings: Vec<ReportLine>,
    pub actions: Vec<ActionLine>,
    /// Findings left after remediation; absent unless actions were executed
    pub remaining: Option<Vec<ReportLine>>,
    pub unverifiable: Vec<Unverifiable>,
    pub verification_failures: Vec<String>,
}

fn lines(audit: &Audit, plan: &Plan) -> Vec<ReportLine> {
    let mut lines: Vec<ReportLine> = audit
        .findings
        .iter()
        .map(|f| ReportLine::new(f, plan))
        .collect();
    // Errors first, otherwise keep the diff order
    lines.sort_by_key(|l| std::cmp::Reverse(l.severity));
    lines
}

impl Report {
    /// Report of an audit, with the commands of the plan that would fix it
    pub fn audit(project_id: &str, project_number: u64, audit: &Audit, plan: &Plan) -> Self {
        Self {
            generated_at: Utc::now(),
            project_id: project_id.to_string(),
            project_number,
            findings: lines(audit, plan),
            actions: plan
                .steps
                .iter()
                .map(|s| ActionLine {
                    stage: s.action.stage(),
                    action: s.action.to_string(),
                    destructive: s.action.is_destructive(),
                    command: s.action.command(),
                    outcome: None,
                })
                .collect(),
            remaining: None,
            unverifiable: audit.unverifiable.clone(),
            verification_failures: vec![],
        }
    }

    /// Attach the outcome of executing the plan
    pub fn with_execution(
        mut self,
        results: &[StepResult],
        after: &Audit,
        failures: &[EngineError],
    ) -> Self {
        for (line, result) in self.actions.iter_mut().zip(results) {
            line.outcome = Some(result.outcome.clone());
        }
        self.remaining = Some(lines(after, &Plan::default()));
        self.unverifiable = after.unverifiable.clone();
        self.verification_failures = failures.iter().map(ToString::to_string).collect();
        self
    }

    /// Findings describing the state the run leaves behind
    pub fn final_findings(&self) -> &[ReportLine] {
        self.remaining.as_deref().unwrap_or(&self.findings)
    }

    /// 0 when no error remains and everything could be checked, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        let has_error = self
            .final_findings()
            .iter()
            .any(|l| l.severity == Severity::Error);
        let has_failed_action = self
            .actions
            .iter()
            .any(|a| matches!(a.outcome, Some(Outcome::Failed(_))));
        if has_error
            || has_failed_action
            || !self.unverifiable.is_empty()
            || !self.verification_failures.is_empty()
        {
            1
        } else {
            0
        }
    }

    /// Human-readable rendering
    pub fn render(&self) -> String {
        let mut out = format!(
            "Trust chain report for {} (project number {}) at {}\n",
            self.project_id,
            self.project_number,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        if self.findings.is_empty() && self.unverifiable.is_empty() {
            out.push_str("\nNo findings: live state matches the declared configuration.\n");
        } else if !self.findings.is_empty() {
            out.push_str("\nFindings:\n");
            out.push_str(&findings_table(&self.findings).to_string());
            out.push('\n');
        }

        if !self.actions.is_empty() {
            out.push_str("\nActions:\n");
            out.push_str(&actions_table(&self.actions).to_string());
            out.push('\n');
        }

        if let Some(remaining) = &self.remaining {
            if remaining.is_empty() {
                out.push_str("\nAll findings resolved.\n");
            } else {
                out.push_str("\nRemaining after remediation:\n");
                out.push_str(&findings_table(remaining).to_string());
                out.push('\n');
            }
        }

        if !self.unverifiable.is_empty() {
            out.push_str("\nCould not be checked:\n");
            for u in &self.unverifiable {
                out.push_str(&format!("  {} '{}': {}\n", u.kind, u.name, u.error));
            }
        }

        for failure in &self.verification_failures {
            out.push_str(&format!("\nRemediation verification failed: {}\n", failure));
        }
        out
    }
}

fn severity_cell(severity: Severity) -> Cell {
    let cell = Cell::new(severity.to_string());
    match severity {
        Severity::Error => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        Severity::Warning => cell.fg(Color::Yellow),
    }
}

fn findings_table(lines: &[ReportLine]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("SEVERITY").add_attribute(Attribute::Bold),
            Cell::new("FINDING").add_attribute(Attribute::Bold),
            Cell::new("RESOURCE").add_attribute(Attribute::Bold),
            Cell::new("HINT").add_attribute(Attribute::Bold),
            Cell::new("COMMAND").add_attribute(Attribute::Bold),
        ]);

    for line in lines {
        table.add_row(vec![
            severity_cell(line.severity),
            Cell::new(line.finding),
            Cell::new(&line.resource),
            Cell::new(&line.hint),
            Cell::new(line.command.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

fn actions_table(actions: &[ActionLine]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("STAGE").add_attribute(Attribute::Bold),
            Cell::new("ACTION").add_attribute(Attribute::Bold),
            Cell::new("OUTCOME").add_attribute(Attribute::Bold),
            Cell::new("COMMAND").add_attribute(Attribute::Bold),
        ]);

    for line in actions {
        let outcome = match &line.outcome {
            None if line.destructive => Cell::new("planned (needs confirmation)").fg(Color::Yellow),
            None => Cell::new("planned"),
            Some(Outcome::Applied) => Cell::new("applied").fg(Color::Green),
            Some(Outcome::Declined) => Cell::new("declined").fg(Color::Yellow),
            Some(Outcome::Skipped(reason)) => {
                Cell::new(format!("skipped: {}", reason)).fg(Color::Yellow)
            }
            Some(Outcome::Failed(message)) => {
                Cell::new(format!("failed: {}", message)).fg(Color::Red)
            }
        };
        table.add_row(vec![
            Cell::new(line.stage),
            Cell::new(&line.action),
            outcome,
            Cell::new(&line.command),
        ]);
    }
    table
}
