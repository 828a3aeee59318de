//! `orgsync snapshot` - capture and inspect snapshots

use anyhow::Result;
use colored::Colorize;
use ghclient::OrgApi;

use super::{Session, save_snapshot};
use crate::Context;
use crate::cli::{CategoryFilter, SnapshotCommand};
use crate::config::Declarations;
use crate::engine::Workload;
use crate::snapshot::SnapshotStore;
use crate::ui;

pub fn run(ctx: &Context, cmd: SnapshotCommand) -> Result<()> {
    let store = SnapshotStore::open_default()?;
    match cmd {
        SnapshotCommand::Capture(filter) => {
            let session = Session::load(ctx)?;
            let api = session.connect(ctx)?;
            capture(ctx, &api, &session.decls, &store, &filter).map(|_| ())
        }
        SnapshotCommand::List => list(&store),
        SnapshotCommand::Show { locator } => show(&store, &locator),
    }
}

/// Capture live state of every declared category
pub(crate) fn capture(
    ctx: &Context,
    api: &dyn OrgApi,
    decls: &Declarations,
    store: &SnapshotStore,
    filter: &CategoryFilter,
) -> Result<Option<String>> {
    let workload = Workload::declared(api, decls, &filter.only, false)?;
    if workload.is_empty() {
        ui::warn("Nothing to capture: no declarations for the selected categories");
        return Ok(None);
    }

    let current = workload.read_current()?;
    save_snapshot(store, current, ctx.quiet).map(Some)
}

fn list(store: &SnapshotStore) -> Result<()> {
    let locators = store.list()?;
    if locators.is_empty() {
        ui::dim(&format!("No snapshots in {}", store.dir().display()));
        return Ok(());
    }

    ui::header("Snapshots");
    for (i, locator) in locators.iter().enumerate() {
        if i == 0 {
            println!("  {} {}", locator, "(latest)".dimmed());
        } else {
            println!("  {locator}");
        }
    }
    Ok(())
}

fn show(store: &SnapshotStore, locator: &str) -> Result<()> {
    let snapshot = store.read(locator)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
