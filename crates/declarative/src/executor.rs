//! Execution engine - drives diff → confirm → apply → record per change

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::values_equal;
use crate::error::ReconcileError;
use crate::planner::{CategoryPlan, ExecutionPlan};
use crate::types::{ApplyReport, ApplyResult, Change, ChangeKind, ExecuteOptions, RemovalPolicy};
use anyhow::Result;

/// Execute a plan with the given options and callbacks
///
/// Categories run in plan order and changes run strictly one at a time.
/// A failed change is recorded and the run continues; only an error the
/// reconciler classifies as fatal stops the run, returning
/// [`ReconcileError::Aborted`] with the outcomes recorded so far.
///
/// # Type Parameters
/// * `C` - Confirm callback type
/// * `P` - Progress callback type
///
/// # Returns
/// Every outcome of the run, successful, skipped and failed
pub fn execute<C, P>(
    plan: &ExecutionPlan<'_>,
    opts: &ExecuteOptions,
    confirm: &mut C,
    progress: &mut P,
) -> Result<ApplyReport>
where
    C: ConfirmCallback,
    P: ProgressCallback,
{
    let mut report = ApplyReport::default();

    for category in &plan.categories {
        execute_category(category, opts, confirm, progress, &mut report)?;
    }

    Ok(report)
}

/// Execute one category's changes into `report`
pub fn execute_category<C, P>(
    plan: &CategoryPlan<'_>,
    opts: &ExecuteOptions,
    confirm: &mut C,
    progress: &mut P,
    report: &mut ApplyReport,
) -> Result<()>
where
    C: ConfirmCallback,
    P: ProgressCallback,
{
    let category = plan.category();
    progress.on_category_start(category, plan.changes.len());

    for change in &plan.changes {
        let description = plan.reconciler.describe(change);
        progress.on_change_start(&description);

        let mut ctx = ApplyContext::new(opts.verbose);
        let outcome = step(plan, change, &description, opts, confirm, &mut ctx);
        let result = match &outcome {
            Ok(result) => result.clone(),
            Err(e) => ApplyResult::Failed {
                error: format!("{e:#}"),
            },
        };

        log::debug!("{}: {:?}", description, result);
        report.record(&description, &result);
        report.failed.extend(ctx.take_failures());
        progress.on_change_complete(&description, &result);

        if let Err(e) = outcome {
            return Err(ReconcileError::Aborted {
                description,
                reason: format!("{e:#}"),
                report: Box::new(std::mem::take(report)),
            }
            .into());
        }
    }

    progress.on_category_complete(category);
    Ok(())
}

/// Move one change to its terminal state
///
/// An `Err` stops the run: a fatal apply error or a failed prompt.
fn step<C: ConfirmCallback>(
    plan: &CategoryPlan<'_>,
    change: &Change,
    description: &str,
    opts: &ExecuteOptions,
    confirm: &mut C,
    ctx: &mut ApplyContext,
) -> Result<ApplyResult> {
    let reconciler = plan.reconciler;

    if let (Some(current), Some(new)) = (&change.current_value, &change.new_value) {
        let current = reconciler.canonicalize(current.clone());
        let new = reconciler.canonicalize(new.clone());
        if values_equal(&current, &new) {
            return Ok(ApplyResult::NoChange);
        }
    }

    if change.kind == ChangeKind::Remove {
        match reconciler.removal_policy() {
            RemovalPolicy::Apply => {}
            RemovalPolicy::Ignore => {
                return Ok(ApplyResult::Skipped {
                    reason: "not declared; left unchanged".to_string(),
                });
            }
            RemovalPolicy::ManualAction => {
                return Ok(ApplyResult::ManualAction {
                    reason: format!(
                        "requires manual action: removing {} is not automated",
                        reconciler.category()
                    ),
                });
            }
        }
    }

    if opts.dry_run {
        return Ok(ApplyResult::Skipped {
            reason: "dry run".to_string(),
        });
    }

    if !confirm.confirm(&format!("{description}?"), change)? {
        return Ok(ApplyResult::Skipped {
            reason: "declined".to_string(),
        });
    }

    match reconciler.apply(change, ctx) {
        Ok(result) => Ok(result),
        Err(e) if reconciler.is_fatal(&e) => Err(e),
        Err(e) => Ok(ApplyResult::Failed {
            error: format!("{e:#}"),
        }),
    }
}
