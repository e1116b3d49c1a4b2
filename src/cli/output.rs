//! Output formatting for CLI commands.
//!
//! Every formatter returns a string; the binary decides where to print it.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{OsacConfig, ValidationResult};
use crate::fulfillment::{CatalogEntry, CatalogKind};
use crate::planner::{ActionType, ExecutionResult, ProvisioningPlan};
use crate::state::{LockInfo, ProvisioningState};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Recorded resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

/// Field row for single-object display.
#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns true if output is JSON.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Formats a provisioning plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ProvisioningPlan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    fn format_plan_text(plan: &ProvisioningPlan, detailed: bool) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - resources match the configuration.\n",
                "✓".green()
            );
        }

        let mut output = String::new();

        let _ = writeln!(output, "\nPlan ({})", plan.operation);
        let _ = write!(output, "   Config hash: {}\n\n", short(&plan.config_hash));

        let rows: Vec<PlanActionRow> = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| PlanActionRow {
                index: i + 1,
                action: Self::format_action_type(a.action_type),
                resource: a.address(),
                id: a.id.clone().unwrap_or_default(),
                reason: if detailed {
                    a.reason.clone()
                } else {
                    Self::truncate(&a.reason, 40)
                },
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to delete\n",
            plan.count(ActionType::Create).to_string().green(),
            plan.count(ActionType::Update).to_string().yellow(),
            plan.count(ActionType::Delete).to_string().red()
        );

        output
    }

    /// Formats the result of executing a plan.
    #[must_use]
    pub fn format_execution(&self, result: &ExecutionResult) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ExecutionJson::from(result)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let status = if result.success {
                    format!("{} Apply complete", "✓".green())
                } else if result.cancelled {
                    format!("{} Apply cancelled", "⚠".yellow())
                } else {
                    format!("{} Apply failed", "✗".red())
                };

                let mut output = format!("{status}: {result}\n");
                for r in result.results.iter().filter(|r| !r.success) {
                    let _ = writeln!(
                        output,
                        "   - {}: {}",
                        r.action.address(),
                        r.error.as_deref().unwrap_or("unknown error")
                    );
                }
                output
            }
        }
    }

    /// Formats provisioning state.
    #[must_use]
    pub fn format_state(&self, state: &ProvisioningState, lock: Option<&LockInfo>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = writeln!(output, "\nState (version {})\n", state.version);
                let _ = writeln!(output, "   Config hash: {}", short(&state.config_hash));
                let _ = writeln!(output, "   Last updated: {}", state.last_updated);
                let _ = writeln!(output, "   Resources: {}", state.resources.len());

                if let Some(lock) = lock {
                    let _ = writeln!(
                        output,
                        "   {} Locked by {} ({}s remaining)",
                        "⚠".yellow(),
                        lock.holder,
                        lock.remaining_secs()
                    );
                }

                if !state.resources.is_empty() {
                    let rows: Vec<ResourceRow> = state
                        .resources
                        .iter()
                        .map(|(address, r)| ResourceRow {
                            address: if r.tainted {
                                format!("{address} {}", "(tainted)".red())
                            } else {
                                address.clone()
                            },
                            id: r.id.clone(),
                            state: r.state.clone().unwrap_or_default(),
                            updated: r.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                        })
                        .collect();
                    output.push('\n');
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                if !state.history.is_empty() {
                    let _ = writeln!(output, "\n   Recent history ({}):", state.history.len());
                    for entry in state.history.iter().rev().take(5) {
                        let status = if entry.success { "✓" } else { "✗" };
                        let _ = writeln!(
                            output,
                            "     {status} {} - {} ({})",
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            entry.operation,
                            entry.resources.join(", ")
                        );
                    }
                }

                output
            }
        }
    }

    /// Formats a resource view.
    #[must_use]
    pub fn format_object(&self, kind: &str, view: &serde_json::Value) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(view).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<FieldRow> = view
                    .as_object()
                    .into_iter()
                    .flatten()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(field, value)| FieldRow {
                        field: field.clone(),
                        value: match value {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        },
                    })
                    .collect();
                format!("\n{kind}\n{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a catalog entry.
    #[must_use]
    pub fn format_catalog_entry(&self, kind: CatalogKind, entry: &CatalogEntry) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(entry).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("\n{} {}\n", kind.name(), entry.id.bold());
                if !entry.title.is_empty() {
                    let _ = writeln!(output, "   {}", entry.title);
                }
                if !entry.description.is_empty() {
                    let _ = writeln!(output, "   {}", entry.description.dimmed());
                }
                output
            }
        }
    }

    /// Formats a validation result with a configuration summary.
    #[must_use]
    pub fn format_validation(
        &self,
        result: &ValidationResult,
        config: &OsacConfig,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.errors.is_empty(),
                    "warnings": result.warnings,
                    "clusters": config.clusters.len(),
                    "compute_instances": config.compute_instances.len(),
                    "hosts": config.hosts.len(),
                    "host_pools": config.host_pools.len(),
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid\n", "✓".green());
                if show_warnings && !result.warnings.is_empty() {
                    output.push_str("\nWarnings:\n");
                    for warning in &result.warnings {
                        let _ = writeln!(output, "  {} {warning}", "⚠".yellow());
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "  Endpoint: {}", config.provider.endpoint);
                let _ = writeln!(output, "  Clusters: {}", config.clusters.len());
                let _ = writeln!(output, "  Compute instances: {}", config.compute_instances.len());
                let _ = writeln!(output, "  Hosts: {}", config.hosts.len());
                let _ = writeln!(output, "  Host pools: {}", config.host_pools.len());
                output
            }
        }
    }

    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::Delete => "-delete".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green().to_string(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow().to_string(), message)
    }

    fn message(&self, status: &str, symbol: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

fn short(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    operation: String,
    config_hash: String,
    action_count: usize,
    creates: usize,
    updates: usize,
    deletes: usize,
    actions: Vec<ActionJson>,
}

#[derive(serde::Serialize)]
struct ActionJson {
    action_type: String,
    address: String,
    id: Option<String>,
    reason: String,
    depends_on: Vec<usize>,
}

impl From<&ProvisioningPlan> for PlanJson {
    fn from(plan: &ProvisioningPlan) -> Self {
        Self {
            operation: plan.operation.to_string(),
            config_hash: plan.config_hash.clone(),
            action_count: plan.action_count(),
            creates: plan.count(ActionType::Create),
            updates: plan.count(ActionType::Update),
            deletes: plan.count(ActionType::Delete),
            actions: plan
                .actions
                .iter()
                .map(|a| ActionJson {
                    action_type: a.action_type.to_string(),
                    address: a.address(),
                    id: a.id.clone(),
                    reason: a.reason.clone(),
                    depends_on: a.dependencies.clone(),
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct ExecutionJson {
    success: bool,
    cancelled: bool,
    successful: usize,
    failed: usize,
    skipped: usize,
    results: Vec<ActionResultJson>,
}

#[derive(serde::Serialize)]
struct ActionResultJson {
    action_type: String,
    address: String,
    id: Option<String>,
    success: bool,
    skipped: bool,
    error: Option<String>,
}

impl From<&ExecutionResult> for ExecutionJson {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            success: result.success,
            cancelled: result.cancelled,
            successful: result.successful,
            failed: result.failed,
            skipped: result.skipped,
            results: result
                .results
                .iter()
                .map(|r| ActionResultJson {
                    action_type: r.action.action_type.to_string(),
                    address: r.action.address(),
                    id: r.id.clone(),
                    success: r.success,
                    skipped: r.skipped,
                    error: r.error.clone(),
                })
                .collect(),
        }
    }
}
