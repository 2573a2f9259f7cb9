//! Command-line interface definition for mcplink
//!
//! This module defines the CLI structure using clap's derive API. The tool
//! is single-purpose (connect, report, exit), so there are no subcommands;
//! the arguments select which deployment to contact and where the run
//! report is written.

use clap::Parser;
use std::path::PathBuf;

/// mcplink - OAuth2-PKCE client for remote MCP services
///
/// Obtains delegated access to a remote MCP deployment via the
/// browser-based authorization flow, opens a protocol session, fetches the
/// tool listing, and writes a run report.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcplink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Named deployment to contact (from the configured deployment map)
    #[arg(short, long, env = "MCPLINK_DEPLOYMENT")]
    pub deployment: Option<String>,

    /// Write the run report here instead of output-<deployment>.json
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
