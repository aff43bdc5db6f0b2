//! CLI argument parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "oidc-guard-demo",
    version,
    about = "Validate OIDC bearer tokens from the command line",
    long_about = "Validates a JWT the way a service protected by oidc-guard would:\n\
                  trusted-host check, OIDC discovery, claim checks and signature verification.\n\n\
                  Options come from a TOML/YAML/JSON file with OIDC_GUARD_* environment overrides,\n\
                  or from --audience/--issuer on the command line."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Default log level (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "info", env = "OIDC_GUARD_LOG")]
    pub log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fully validate a token and print its claims
    Validate(ValidateArgs),

    /// Decode a token without verifying anything
    Decode(TokenInput),
}

/// Arguments for `validate`
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Options file (.toml, .yaml, .yml or .json)
    #[arg(long, short = 'c', conflicts_with_all = ["audience", "issuer"])]
    pub config: Option<PathBuf>,

    /// Trusted audience, when no options file is given
    #[arg(long, requires = "issuer")]
    pub audience: Option<String>,

    /// Trusted issuer binding URL, when no options file is given
    #[arg(long, requires = "audience")]
    pub issuer: Option<String>,

    #[command(flatten)]
    pub token: TokenInput,
}

/// Where the token comes from
#[derive(Args, Debug)]
pub struct TokenInput {
    /// Compact JWT; read from stdin when omitted
    pub token: Option<String>,
}
