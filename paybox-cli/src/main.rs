//! Paybox command-line client.
//!
//! Signs fields, generates Paybox System payment forms, runs Paybox Direct
//! operations and verifies callbacks with the merchant configuration in
//! `paybox.toml` (or `$PAYBOX_CONFIG`).
//!
//! Results are printed as JSON on stdout; logs go to stderr (`RUST_LOG`,
//! `LOG_FORMAT=json|pretty`).

#![allow(clippy::multiple_crate_versions, reason = "transitive dependencies from reqwest")]

mod observability;

use std::{net::IpAddr, path::PathBuf};

use anyhow::{Context, bail};
use chrono::{DateTime, FixedOffset};
use clap::{Args, Parser, Subcommand, ValueEnum};
use paybox_gateway::{
    PayboxGateway,
    amount::Currency,
    config::PayboxConfig,
    params::ParameterMap,
    requests::{CaptureMode, DirectOperation},
    signing::{EnvSecretStore, FileSecretStore, SecretStore},
    transport::HttpTransport,
};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::observability::{LogFormat, init_logging};

#[derive(Debug, Parser)]
#[command(
    name = "paybox",
    version,
    about = "Paybox request signing, direct operations and callback verification"
)]
struct Cli {
    /// Merchant configuration file.
    #[arg(short, long, env = "PAYBOX_CONFIG", default_value = "paybox.toml")]
    config: PathBuf,

    /// Where `hmac_key` is resolved: a file path or an environment variable name.
    #[arg(long, value_enum, default_value_t = SecretSource::File)]
    secrets: SecretSource,

    /// Base directory for relative secret file paths.
    #[arg(long)]
    secrets_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SecretSource {
    File,
    Env,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the HMAC of `KEY=VALUE` fields, in the given order.
    Sign {
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Builds a signed Paybox System payment form.
    Authorization(AuthorizationArgs),
    /// Captures an authorization made without capture.
    Capture(DirectArgs),
    /// Cancels a payment.
    Cancel(DirectArgs),
    /// Refunds a captured payment.
    Refund(DirectArgs),
    /// Verifies a callback query string.
    Verify {
        /// Raw query string or form body received on the notification URL.
        query: String,

        /// Address the callback came from.
        #[arg(long)]
        ip: Option<IpAddr>,
    },
}

#[derive(Debug, Args)]
struct AuthorizationArgs {
    /// Amount in major units, e.g. `49.90`.
    #[arg(long)]
    amount: Decimal,

    /// Currency code; defaults to the configured currency.
    #[arg(long)]
    currency: Option<Currency>,

    /// Merchant order reference.
    #[arg(long)]
    reference: String,

    /// Customer e-mail address.
    #[arg(long)]
    email: String,

    /// Authorize only; capture later with `paybox capture`.
    #[arg(long)]
    without_capture: bool,

    /// Form timestamp (RFC 3339); defaults to now.
    #[arg(long, value_parser = parse_time)]
    time: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Args)]
struct DirectArgs {
    /// Amount in major units, e.g. `49.90`.
    #[arg(long)]
    amount: Decimal,

    /// Currency code; defaults to the configured currency.
    #[arg(long)]
    currency: Option<Currency>,

    /// Merchant order reference.
    #[arg(long)]
    reference: String,

    /// Request number, unique within the day.
    #[arg(long)]
    request_number: i64,

    /// Paybox call number from the authorization callback.
    #[arg(long)]
    call_number: String,

    /// Paybox transaction number from the authorization callback.
    #[arg(long)]
    transaction_number: String,

    /// Server that handled the authorization; the matching direct server is used.
    #[arg(long)]
    previous_url: Option<Url>,

    /// Do not retry on another server.
    #[arg(long)]
    no_retry: bool,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

fn parse_time(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(raw).map_err(|e| format!("invalid RFC 3339 time '{raw}': {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(LogFormat::from_env(), "warn");

    let config = PayboxConfig::from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.secrets {
        SecretSource::File => {
            let store =
                cli.secrets_dir.map_or_else(FileSecretStore::new, FileSecretStore::with_base_dir);
            run(cli.command, config, store).await
        }
        SecretSource::Env => run(cli.command, config, EnvSecretStore).await,
    }
}

async fn run<S: SecretStore>(
    command: Command,
    config: PayboxConfig,
    store: S,
) -> anyhow::Result<()> {
    let gateway = PayboxGateway::with_http(config, store).context("building gateway")?;

    match command {
        Command::Sign { fields } => {
            let params: ParameterMap = fields.into_iter().collect();
            println!("{}", gateway.generator().get(&params)?);
        }
        Command::Authorization(args) => authorization(&gateway, args)?,
        Command::Capture(args) => direct(&gateway, DirectOperation::Capture, args).await?,
        Command::Cancel(args) => direct(&gateway, DirectOperation::Cancel, args).await?,
        Command::Refund(args) => direct(&gateway, DirectOperation::Refund, args).await?,
        Command::Verify { query, ip } => verify(&gateway, &query, ip)?,
    }

    Ok(())
}

fn authorization<S: SecretStore>(
    gateway: &PayboxGateway<HttpTransport, S>,
    args: AuthorizationArgs,
) -> anyhow::Result<()> {
    let mode =
        if args.without_capture { CaptureMode::WithoutCapture } else { CaptureMode::WithCapture };
    let currency = args.currency.unwrap_or(gateway.config().currency);

    let mut form = gateway
        .authorization(mode)
        .set_amount(args.amount, currency)?
        .set_payment_number(args.reference)
        .set_customer_email(args.email);
    if let Some(time) = args.time {
        form = form.set_time(time);
    }

    let signed = form.set_url()?.sign()?;
    println!("{}", serde_json::to_string_pretty(&signed)?);
    Ok(())
}

async fn direct<S: SecretStore>(
    gateway: &PayboxGateway<HttpTransport, S>,
    operation: DirectOperation,
    args: DirectArgs,
) -> anyhow::Result<()> {
    let currency = args.currency.unwrap_or(gateway.config().currency);

    let request = gateway
        .direct(operation)
        .set_amount(args.amount, currency)?
        .set_payment_number(args.reference)
        .set_day_request_number(args.request_number)?
        .set_paybox_call_number(args.call_number)
        .set_paybox_transaction_number(args.transaction_number);
    let request = match &args.previous_url {
        Some(previous) => request.set_url_from(previous, false)?,
        None => request.set_url()?,
    };

    let first = request.send(None).await;
    let retry = !args.no_retry
        && match &first {
            Ok(response) => response.should_be_repeated(),
            Err(e) => e.is_retryable(),
        };

    let response = if retry {
        let failed = request.url().cloned().context("request has no target server")?;
        match &first {
            Ok(response) => warn!(
                %failed,
                code = response.response_code(),
                "paybox asked to repeat on another server"
            ),
            Err(e) => warn!(%failed, error = %e, "server unavailable, retrying on another server"),
        }
        request.set_url_from(&failed, true)?.send(None).await?
    } else {
        first?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "operation": operation.to_string(),
            "code": response.response_code(),
            "status": response.code().to_string(),
            "fields": response.fields(),
        }))?
    );

    if !response.is_success() {
        bail!(
            "{operation} not accepted: {} {}",
            response.response_code(),
            response.comment().unwrap_or_default()
        );
    }
    info!(%operation, "done");
    Ok(())
}

fn verify<S: SecretStore>(
    gateway: &PayboxGateway<HttpTransport, S>,
    query: &str,
    ip: Option<IpAddr>,
) -> anyhow::Result<()> {
    let verifier = gateway.verifier();
    let notification = verifier.verify_query(query);
    let trusted = ip.map(|ip| verifier.is_trusted_source(ip));

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "verified": notification.is_verified(),
            "trusted_source": trusted,
            "success": notification.is_success(),
            "order_number": notification.order_number(),
            "fields": notification.fields(),
        }))?
    );

    if !notification.is_verified() {
        bail!("notification signature is invalid");
    }
    if trusted == Some(false) {
        bail!("notification comes from an untrusted address");
    }
    Ok(())
}
