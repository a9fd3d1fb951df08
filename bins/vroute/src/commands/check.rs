//! vroute check: parse a route file and print it back.

use std::path::PathBuf;

use clap::Args;

use super::{Context, report_rejected};

#[derive(Args)]
pub struct CheckCmd {
    /// Route file, one route per line (`-` for stdin).
    file: PathBuf,

    /// Output JSON.
    #[arg(short = 'j', long)]
    json: bool,
}

impl CheckCmd {
    pub fn run(self, ctx: &Context) -> anyhow::Result<bool> {
        let report = ctx.load(&self.file)?;

        if self.json {
            let rejected: Vec<_> = report
                .rejected
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "line": r.line,
                        "text": r.text,
                        "error": r.error.to_string(),
                    })
                })
                .collect();
            let out = serde_json::json!({
                "routes": report.routes,
                "rejected": rejected,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(report.rejected.is_empty());
        }

        for route in &report.routes {
            println!("{route}");
        }
        Ok(report_rejected(&self.file, &report))
    }
}
