//! vroute command implementations.

pub mod apply;
pub mod check;
pub mod encode;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::ValueEnum;
use vroute::Connection;
use vroute::names::SystemResolver;
use vroute::route::{KernelFeatures, LoadReport, RouteParser};

/// Optional kernel features that can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Feature {
    Encap,
    Expires,
    Pref,
    Congctl,
    Initrwnd,
    Quickack,
    Features,
}

/// Settings shared by every subcommand.
pub struct Context {
    resolver: SystemResolver,
    features: KernelFeatures,
    netns: Option<String>,
}

impl Context {
    pub fn new(iproute2_dir: &Path, netns: Option<String>, disabled: &[Feature]) -> Self {
        let mut features = KernelFeatures::default();
        for feature in disabled {
            match feature {
                Feature::Encap => features.encap = false,
                Feature::Expires => features.expires = false,
                Feature::Pref => features.pref = false,
                Feature::Congctl => features.congctl = false,
                Feature::Initrwnd => features.initrwnd = false,
                Feature::Quickack => features.quickack = false,
                Feature::Features => features.features = false,
            }
        }

        Self {
            resolver: SystemResolver::from_iproute2_dir(iproute2_dir),
            features,
            netns,
        }
    }

    /// Parse a route file; `-` reads standard input.
    pub fn load(&self, path: &Path) -> anyhow::Result<LoadReport> {
        let text = if path == Path::new("-") {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read routes from stdin")?;
            text
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?
        };

        let parser = RouteParser::new(&self.resolver).with_features(self.features);
        Ok(parser.load(&text))
    }

    /// Open the route socket, inside `--netns` if given.
    pub fn connect(&self) -> anyhow::Result<Connection> {
        match self.netns {
            Some(ref netns) => {
                let path = if netns.contains('/') {
                    PathBuf::from(netns)
                } else {
                    Path::new("/var/run/netns").join(netns)
                };
                Connection::new_in_namespace_path(&path)
                    .with_context(|| format!("cannot enter namespace {}", path.display()))
            }
            None => Connection::new().context("cannot open route socket"),
        }
    }
}

/// Print rejected lines to stderr; returns true if there were none.
pub fn report_rejected(path: &Path, report: &LoadReport) -> bool {
    for rejected in &report.rejected {
        eprintln!(
            "{}:{}: {}: {}",
            path.display(),
            rejected.line,
            rejected.error,
            rejected.text
        );
    }
    report.rejected.is_empty()
}
