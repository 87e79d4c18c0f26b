//! CLI module for the APIM gateway
//!
//! A single subcommand for now:
//! - `serve`: run the gateway server (default)

pub mod serve;

use clap::{Parser, Subcommand};

/// APIM Gateway - subscription-based request admission and forwarding
#[derive(Parser)]
#[command(name = "apim-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway server (default mode)
    Serve,
}
