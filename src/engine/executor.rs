//! Execution engine - terminal confirmation, progress and the final report

use anyhow::Result;
use colored::Colorize;
use declarative::{
    ApplyReport, ApplyResult, AutoConfirm, Change, ConfirmCallback, ExecuteOptions,
    ExecutionPlan, ProgressCallback, ReconcileError,
};

/// Options for a run (adds `yes` for confirmation skip)
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Verbose output
    pub verbose: bool,
}

impl RunOptions {
    fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }
}

/// Asks on the terminal, one change at a time
///
/// An empty answer accepts, shown as `[Y/n]`.
pub struct TerminalConfirm;

impl ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str, _change: &Change) -> Result<bool> {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .show_default(true)
            .interact()?;
        Ok(confirmed)
    }
}

/// Prints one line per finished change
#[derive(Default)]
pub struct TerminalProgress {
    verbose: bool,
}

impl TerminalProgress {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

/// Marker for a terminal result
pub fn result_symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
        ApplyResult::ManualAction { .. } => "⚠",
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_category_start(&mut self, category: &str, changes: usize) {
        if changes > 0 {
            println!();
            println!(
                "  {} Applying {} ({} changes)...",
                "→".cyan(),
                category.bold(),
                changes
            );
        }
    }

    fn on_change_start(&mut self, description: &str) {
        if self.verbose {
            log::info!("Applying {description}");
        }
    }

    fn on_change_complete(&mut self, description: &str, result: &ApplyResult) {
        let symbol = result_symbol(result);
        let symbol = match result {
            r if r.is_change() => symbol.green(),
            ApplyResult::Failed { .. } => symbol.red(),
            ApplyResult::ManualAction { .. } => symbol.yellow(),
            _ => symbol.dimmed(),
        };
        match result {
            ApplyResult::Failed { error } => {
                println!("    {symbol} {description}: {}", error.red());
            }
            ApplyResult::Skipped { reason } | ApplyResult::ManualAction { reason } => {
                println!("    {symbol} {description} {}", format!("({reason})").dimmed());
            }
            _ => println!("    {symbol} {description}"),
        }
    }

    fn on_category_complete(&mut self, category: &str) {
        log::debug!("{category}: done");
    }
}

/// Confirm and apply a plan, printing progress and the final report
///
/// An aborted run still prints what it recorded before returning the error.
pub fn run(plan: &ExecutionPlan<'_>, opts: &RunOptions) -> Result<ApplyReport> {
    let mut progress = TerminalProgress::new(opts.verbose);
    let execute_opts = opts.execute_options();

    let outcome = if opts.yes {
        declarative::execute(plan, &execute_opts, &mut AutoConfirm, &mut progress)
    } else {
        declarative::execute(plan, &execute_opts, &mut TerminalConfirm, &mut progress)
    };

    match outcome {
        Ok(report) => {
            print_report(&report, opts.dry_run);
            Ok(report)
        }
        Err(e) => {
            if let Some(ReconcileError::Aborted { report, .. }) =
                e.downcast_ref::<ReconcileError>()
            {
                print_report(report, opts.dry_run);
            }
            Err(e)
        }
    }
}

/// Print every outcome of a run
pub fn print_report(report: &ApplyReport, dry_run: bool) {
    println!();
    if dry_run {
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if report.is_success() {
        println!("  {} Organization reconciled successfully!", "✓".green().bold());
    } else {
        println!("  {} Reconciled with errors", "⚠".yellow().bold());
    }

    if !report.successful.is_empty() {
        println!("    • {} applied", report.successful.len());
        for description in &report.successful {
            println!("      {} {}", "✓".green(), description);
        }
    }

    let manual: Vec<_> = report.manual_actions().collect();
    let skipped: Vec<_> = report.skipped.iter().filter(|s| !s.manual_action).collect();

    if !skipped.is_empty() {
        println!("    • {} skipped", skipped.len());
        for entry in skipped {
            println!(
                "      {} {} {}",
                "⊘".dimmed(),
                entry.description,
                format!("({})", entry.reason).dimmed()
            );
        }
    }

    if !manual.is_empty() {
        println!("    • {} {}", manual.len(), "require manual action".yellow());
        for entry in manual {
            println!("      {} {}: {}", "⚠".yellow(), entry.description, entry.reason);
        }
    }

    if !report.failed.is_empty() {
        println!("    • {} {}", report.failed.len(), "failed".red());
        for entry in &report.failed {
            println!("      {} {}: {}", "✗".red(), entry.description, entry.reason);
        }
    }

    if report.unchanged > 0 {
        println!("    • {} already up to date", report.unchanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_symbols() {
        assert_eq!(result_symbol(&ApplyResult::Created), "✓");
        assert_eq!(
            result_symbol(&ApplyResult::Failed {
                error: "x".to_string()
            }),
            "✗"
        );
        assert_eq!(
            result_symbol(&ApplyResult::ManualAction {
                reason: "x".to_string()
            }),
            "⚠"
        );
    }

    #[test]
    fn test_run_options_map_to_executor() {
        let opts = RunOptions {
            dry_run: true,
            yes: true,
            verbose: false,
        };
        let execute = opts.execute_options();
        assert!(execute.dry_run);
        assert!(!execute.verbose);
    }

    #[test]
    fn test_run_with_yes_applies_without_prompting() {
        use crate::resource::VariablesReconciler;
        use declarative::{CategoryPlan, StateMap};
        use ghclient::MockOrg;
        use serde_json::json;

        let mock = MockOrg::new("acme");
        let reconciler = VariablesReconciler::new(&mock);
        let mut plan = ExecutionPlan::new();
        plan.push(
            CategoryPlan::prepare(
                &reconciler,
                StateMap::from([("REGION".to_string(), json!("eu"))]),
            )
            .unwrap(),
        );

        let report = run(
            &plan,
            &RunOptions {
                yes: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(report.successful.len(), 1);
        assert_eq!(mock.variable("REGION").as_deref(), Some("eu"));
    }

    #[test]
    fn test_aborted_run_returns_recorded_outcomes() {
        use crate::resource::VariablesReconciler;
        use declarative::{CategoryPlan, StateMap};
        use ghclient::MockOrg;
        use serde_json::json;

        let mock = MockOrg::new("acme").fail_on("create_variable B", 401);
        let reconciler = VariablesReconciler::new(&mock);
        let mut plan = ExecutionPlan::new();
        plan.push(
            CategoryPlan::prepare(
                &reconciler,
                StateMap::from([
                    ("A".to_string(), json!("1")),
                    ("B".to_string(), json!("2")),
                ]),
            )
            .unwrap(),
        );

        let err = run(
            &plan,
            &RunOptions {
                yes: true,
                ..Default::default()
            },
        )
        .unwrap_err();

        let Some(ReconcileError::Aborted { report, .. }) = err.downcast_ref::<ReconcileError>()
        else {
            panic!("expected an aborted run, got {err:#}");
        };
        assert_eq!(report.successful, vec!["add variables 'A'"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(mock.variable("A").as_deref(), Some("1"));
    }
}
