//! `orgsync diff` - preview what apply would change

use anyhow::Result;
use ghclient::OrgApi;

use super::Session;
use crate::Context;
use crate::cli::DiffArgs;
use crate::config::Declarations;
use crate::engine::{self, Planned, Workload};
use crate::ui;

pub fn run(ctx: &Context, args: DiffArgs) -> Result<()> {
    let session = Session::load(ctx)?;
    let api = session.connect(ctx)?;
    show(&api, &session.decls, &args).map(|_| ())
}

/// Plan and print; returns the number of pending changes
pub(crate) fn show(api: &dyn OrgApi, decls: &Declarations, args: &DiffArgs) -> Result<usize> {
    let workload = Workload::declared(api, decls, &args.filter.only, false)?;
    if workload.is_empty() {
        ui::warn("Nothing to compare: no declarations for the selected categories");
        return Ok(0);
    }

    let Planned { plan, .. } = workload.plan()?;
    let plan = plan.filter_by_target(args.target.as_deref());
    engine::display_plan(&plan);

    Ok(plan.total_changes())
}
