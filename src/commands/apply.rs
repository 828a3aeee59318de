//! `orgsync apply` - make the organization match the declarations
//!
//! Live state is captured to a snapshot before the first change, so a run
//! can be undone with `orgsync restore`.

use anyhow::Result;
use ghclient::OrgApi;

use super::{RunFailed, Session, save_snapshot};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::Declarations;
use crate::engine::{self, Planned, RunOptions, Workload};
use crate::snapshot::SnapshotStore;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let session = Session::load(ctx)?;
    let api = session.connect(ctx)?;
    let store = SnapshotStore::open_default()?;
    apply(ctx, &api, &session.decls, &store, &args)
}

pub(crate) fn apply(
    ctx: &Context,
    api: &dyn OrgApi,
    decls: &Declarations,
    store: &SnapshotStore,
    args: &ApplyArgs,
) -> Result<()> {
    let workload = Workload::declared(api, decls, &args.filter.only, args.rotate_secrets)?;
    if workload.is_empty() {
        ui::warn("Nothing to apply: no declarations for the selected categories");
        return Ok(());
    }

    let Planned { plan, current } = workload.plan()?;
    let plan = plan.filter_by_target(args.target.as_deref());
    engine::display_plan(&plan);

    if plan.is_empty() {
        return Ok(());
    }

    if !args.dry_run && !args.no_snapshot {
        save_snapshot(store, current, ctx.quiet)?;
    }

    let report = engine::run(
        &plan,
        &RunOptions {
            dry_run: args.dry_run,
            yes: args.yes,
            verbose: ctx.verbose > 0,
        },
    )?;

    if !report.failed.is_empty() {
        return Err(RunFailed {
            failed: report.failed.len(),
        }
        .into());
    }
    Ok(())
}
