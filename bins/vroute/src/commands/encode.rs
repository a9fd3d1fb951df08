//! vroute encode: show the requests a route file would send.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use vroute::RouteOp;
use vroute::route::RouteRequest;
use vroute::route::message::DecodedRequest;

use super::{Context, report_rejected};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Op {
    Add,
    Replace,
    Delete,
}

impl From<Op> for RouteOp {
    fn from(op: Op) -> Self {
        match op {
            Op::Add => RouteOp::Add,
            Op::Replace => RouteOp::Replace,
            Op::Delete => RouteOp::Delete,
        }
    }
}

#[derive(Args)]
pub struct EncodeCmd {
    /// Route file, one route per line (`-` for stdin).
    file: PathBuf,

    /// Operation to encode.
    #[arg(long, value_enum, default_value = "add")]
    op: Op,

    /// Print only the hex dump of each request.
    #[arg(long)]
    raw: bool,
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|chunk| {
            chunk
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl EncodeCmd {
    pub fn run(self, ctx: &Context) -> anyhow::Result<bool> {
        let report = ctx.load(&self.file)?;
        let mut ok = report_rejected(&self.file, &report);
        let op = RouteOp::from(self.op);

        for route in &report.routes {
            let bytes = match RouteRequest::new(route, op).build() {
                Ok(msg) => msg.finish(),
                Err(e) => {
                    eprintln!("{op} {}: {e}", route.target());
                    ok = false;
                    continue;
                }
            };

            if self.raw {
                println!("{}", hex_dump(&bytes));
                continue;
            }
            println!("# {op} {route}");
            println!("{}", DecodedRequest::parse(&bytes)?);
            println!("{}", hex_dump(&bytes));
        }
        Ok(ok)
    }
}
