//! Command-line interface.
//!
//! `serve` is the default; the other commands are one-shot maintenance tasks
//! that reuse the same config and store.

mod commands;

use clap::{Parser, Subcommand};

/// Bistro - restaurant backend authentication core
#[derive(Parser)]
#[command(name = "bistro")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the housekeeping scheduler
    #[command(alias = "daemon")]
    Serve,

    /// Ensure the default roles exist
    SeedRoles,

    /// Run every housekeeping job once
    Housekeeping,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Create a local account with a password
    CreateAccount {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: Option<String>,

        /// Role name, e.g. `ROLE_STAFF`
        #[arg(long, default_value = "ROLE_STAFF")]
        role: String,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Print a signed VNPay payment URL
    PaymentUrl {
        /// Amount in VND
        #[arg(long)]
        amount: u64,

        #[arg(long)]
        order_id: String,

        #[arg(long)]
        order_info: Option<String>,
    },
}

pub use commands::*;
