//! oidc-guard demo
//!
//! Validates or decodes a bearer token and prints the result as JSON on
//! stdout. Exits non-zero when the token is rejected.

mod cli;
mod logging;

use std::io::Read;

use anyhow::{Context, Result, bail};
use clap::Parser;
use oidc_guard::{AuthMiddleware, Token, ValidationOptions};
use serde_json::json;
use tracing::{error, info};
use url::Url;

use cli::{Cli, Command, TokenInput, ValidateArgs};

fn read_token(input: TokenInput) -> Result<String> {
    if let Some(token) = input.token {
        return Ok(token);
    }

    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read token from stdin")?;
    let token = buf.trim();
    if token.is_empty() {
        bail!("no token given on the command line or stdin");
    }
    Ok(token.to_string())
}

fn load_options(args: &ValidateArgs) -> Result<ValidationOptions> {
    if let Some(path) = &args.config {
        return ValidationOptions::from_file(path)
            .with_context(|| format!("failed to load options from {}", path.display()));
    }

    match (&args.audience, &args.issuer) {
        (Some(audience), Some(issuer)) => {
            let binding = issuer
                .parse::<Url>()
                .with_context(|| format!("invalid issuer URL {issuer:?}"))?;
            let options = ValidationOptions::new(audience.clone(), binding);
            options.validate()?;
            Ok(options)
        }
        _ => bail!("either --config or both --audience and --issuer are required"),
    }
}

fn print_token(token: &Token) -> Result<()> {
    let output = json!({
        "valid": token.is_valid(),
        "header": token.header(),
        "claims": token.claims(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn validate(args: ValidateArgs) -> Result<()> {
    let options = load_options(&args)?;
    let raw = read_token(args.token)?;

    info!(
        audience = %options.audience,
        binding_host = options.binding_host().unwrap_or_default(),
        "Validating token"
    );
    let middleware = AuthMiddleware::new(options)?;

    match middleware.parse_and_validate_jwt(&raw).await {
        Ok(token) => print_token(&token),
        Err(e) => {
            error!(kind = ?e.kind(), retryable = e.is_retryable(), "{e}");
            Err(e.into())
        }
    }
}

fn decode(input: TokenInput) -> Result<()> {
    let raw = read_token(input)?;
    let token = Token::decode_unverified(&raw)?;
    print_token(&token)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format)?;

    match cli.command {
        Command::Validate(args) => validate(args).await,
        Command::Decode(input) => decode(input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_options_from_flags() {
        let cli = Cli::parse_from([
            "oidc-guard-demo",
            "validate",
            "--audience",
            "svc-1",
            "--issuer",
            "https://idp.example.com",
            "a.b.c",
        ]);
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        let options = load_options(&args).unwrap();
        assert_eq!(options.audience, "svc-1");
        assert_eq!(options.binding_host(), Some("idp.example.com"));
        assert_eq!(args.token.token.as_deref(), Some("a.b.c"));
    }

    #[test]
    fn test_config_conflicts_with_flags() {
        let result = Cli::try_parse_from([
            "oidc-guard-demo",
            "validate",
            "--config",
            "guard.toml",
            "--audience",
            "svc-1",
            "--issuer",
            "https://idp.example.com",
        ]);
        assert!(result.is_err());
    }
}
