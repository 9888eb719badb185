//! CLI entry point for Waprov.

pub mod commands;

use clap::{Parser, Subcommand};

/// Waprov messaging-instance CLI
#[derive(Parser, Debug)]
#[command(name = "waprov", version, about = "Waprov: messaging instance provisioning CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Backend session management
    Session(SessionArgs),
    /// Messaging instance management
    Instances(InstancesArgs),
}

/// Arguments for the `session` subcommand group.
#[derive(Parser, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommands,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Show stored credentials and their expiry
    Status,
    /// Store credentials obtained from the login page
    Login(LoginArgs),
    /// Clear stored credentials
    Logout,
}

/// Arguments for `waprov session login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Access token
    #[arg(long)]
    pub access_token: String,
    /// Refresh token
    #[arg(long)]
    pub refresh_token: Option<String>,
}

/// Arguments for the `instances` subcommand group.
#[derive(Parser, Debug)]
pub struct InstancesArgs {
    #[command(subcommand)]
    pub command: InstanceCommands,
}

/// Instance subcommands.
#[derive(Subcommand, Debug)]
pub enum InstanceCommands {
    /// List registered instances
    List,
    /// Show one instance
    Get(InstanceIdArgs),
    /// Create an instance and print its pairing QR
    Create(CreateArgs),
    /// Delete and recreate an instance, keeping its code
    Reset(ResetArgs),
    /// Write the stored pairing QR to a PNG file
    Qr(QrArgs),
}

/// Arguments naming one instance.
#[derive(Parser, Debug)]
pub struct InstanceIdArgs {
    /// Local instance id
    pub id: String,
}

/// Arguments for `waprov instances create`.
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Display name (also used to derive the provider instance name)
    pub name: String,
    /// Phone number with country code
    pub phone: String,
    /// Provider integration override
    #[arg(long)]
    pub integration: Option<String>,
    /// Follow the pairing countdown after creation
    #[arg(long)]
    pub watch: bool,
}

/// Arguments for `waprov instances reset`.
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Local instance id
    pub id: String,
    /// Replace the phone number
    #[arg(long)]
    pub phone: Option<String>,
    /// Follow the pairing countdown after the reset
    #[arg(long)]
    pub watch: bool,
}

/// Arguments for `waprov instances qr`.
#[derive(Parser, Debug)]
pub struct QrArgs {
    /// Local instance id
    pub id: String,
    /// Output PNG path
    #[arg(short, long)]
    pub out: std::path::PathBuf,
}
