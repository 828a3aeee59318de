//! `orgsync restore` - make the organization match a snapshot

use anyhow::{Result, anyhow};
use ghclient::OrgApi;

use super::{RunFailed, Session, save_snapshot};
use crate::Context;
use crate::cli::RestoreArgs;
use crate::config::Declarations;
use crate::engine::{self, Planned, RunOptions, Workload, restore_scope};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::ui;

pub fn run(ctx: &Context, args: RestoreArgs) -> Result<()> {
    let store = SnapshotStore::open_default()?;
    let locator = match &args.locator {
        Some(locator) => locator.clone(),
        None => store
            .latest()?
            .ok_or_else(|| anyhow!("No snapshots in {}", store.dir().display()))?,
    };
    let snapshot = store.read(&locator)?;

    let session = Session::load(ctx)?;
    let api = session.connect(ctx)?;
    restore(ctx, &api, &session.decls, &store, &snapshot, &args)
}

pub(crate) fn restore(
    ctx: &Context,
    api: &dyn OrgApi,
    decls: &Declarations,
    store: &SnapshotStore,
    snapshot: &Snapshot,
    args: &RestoreArgs,
) -> Result<()> {
    if !ctx.quiet {
        ui::info(&format!(
            "Restoring state captured {}",
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }

    let scope = restore_scope(decls, snapshot);
    let workload = Workload::restore(api, &scope, snapshot, &args.filter.only)?;
    if workload.is_empty() {
        ui::warn("Nothing to restore: the snapshot holds none of the selected categories");
        return Ok(());
    }

    let Planned { plan, current } = workload.plan()?;
    engine::display_plan(&plan);

    if plan.is_empty() {
        return Ok(());
    }

    if !args.dry_run {
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
