//! vroute apply, withdraw and reload: talk to the kernel.

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use vroute::RouteOp;
use vroute::route::{AppliedOp, apply_routes, reconcile};

use super::{Context, report_rejected};

fn print_applied(applied: &[AppliedOp]) -> bool {
    let mut denied = false;
    for op in applied {
        match &op.result {
            Ok(()) => println!("{op}"),
            Err(e) => {
                denied |= e.is_permission_denied();
                eprintln!("{op}");
            }
        }
    }
    if denied {
        eprintln!("hint: changing routes requires CAP_NET_ADMIN");
    }
    applied.iter().all(AppliedOp::is_success)
}

#[derive(Args)]
pub struct ApplyCmd {
    /// Route file, one route per line (`-` for stdin).
    file: PathBuf,
}

impl ApplyCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<bool> {
        let report = ctx.load(&self.file)?;
        let parsed = report_rejected(&self.file, &report);
        let mut routes = report.routes;

        let conn = ctx.connect()?;
        let applied = apply_routes(&conn, &mut routes, RouteOp::Add).await;
        info!(routes = routes.len(), requests = applied.len(), "applied route file");
        Ok(print_applied(&applied) && parsed)
    }
}

#[derive(Args)]
pub struct WithdrawCmd {
    /// Route file, one route per line (`-` for stdin).
    file: PathBuf,
}

impl WithdrawCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<bool> {
        let report = ctx.load(&self.file)?;
        let parsed = report_rejected(&self.file, &report);
        let mut routes = report.routes;
        // a previous `apply` installed them
        for route in &mut routes {
            route.installed = true;
        }

        let conn = ctx.connect()?;
        let applied = apply_routes(&conn, &mut routes, RouteOp::Delete).await;
        Ok(print_applied(&applied) && parsed)
    }
}

#[derive(Args)]
pub struct ReloadCmd {
    /// Route file currently applied.
    old: PathBuf,

    /// Route file to apply instead.
    new: PathBuf,
}

impl ReloadCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<bool> {
        let old_report = ctx.load(&self.old)?;
        let new_report = ctx.load(&self.new)?;
        let parsed = report_rejected(&self.old, &old_report) & report_rejected(&self.new, &new_report);

        let mut old = old_report.routes;
        for route in &mut old {
            route.installed = true;
        }
        let mut new = new_report.routes;

        let conn = ctx.connect()?;
        let mut applied = reconcile(&conn, &mut old, &mut new).await;
        applied.extend(apply_routes(&conn, &mut new, RouteOp::Add).await);
        Ok(print_applied(&applied) && parsed)
    }
}
