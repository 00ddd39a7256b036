//! Indexgate policy checker
//!
//! Loads a settings file and evaluates a single simulated REST call against it.

use anyhow::Context;
use clap::Parser;
use http::header::AUTHORIZATION;
use http::Request;
use indexgate::{
    ActionKind, ActionRequest, AuthorizationGate, BufferedChannel, GateOutcome, Gatekeeper,
    InMemoryCatalog, Inbound, RuleRegistry, Settings,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "indexgate-check")]
#[command(about = "Evaluate one request against an indexgate policy")]
struct Args {
    /// Path to the TOML settings file
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Action name, e.g. indices:data/read/search
    #[arg(short = 'a', long)]
    action: String,

    /// Request kind (search, fixed-list) [default: search]
    #[arg(short = 'k', long, default_value = "search")]
    kind: String,

    /// Requested index (repeatable)
    #[arg(short = 'i', long = "index")]
    indices: Vec<String>,

    /// Index or alias present in the catalog (repeatable)
    #[arg(long = "catalog")]
    catalog: Vec<String>,

    /// Authorization header value, e.g. "Basic YWRtaW46c2VjcmV0"
    #[arg(long)]
    authorization: Option<String>,

    /// Evaluate the block chain without the credential pre-filter
    #[arg(long)]
    skip_authentication: bool,
}

/// Parse the request kind from CLI string
fn parse_kind(s: &str) -> Result<ActionKind, String> {
    match s.to_lowercase().as_str() {
        "search" => Ok(ActionKind::Search),
        "fixed-list" | "fixed_list" | "fixedlist" => Ok(ActionKind::FixedList),
        _ => Err(format!(
            "Invalid request kind '{}'. Valid options: search, fixed-list",
            s
        )),
    }
}

#[derive(Serialize)]
struct Decision {
    action: String,
    outcome: &'static str,
    block: Option<String>,
    indices: Vec<String>,
    status: Option<u16>,
    response: Option<String>,
}

fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let kind = parse_kind(&args.kind).map_err(anyhow::Error::msg)?;
    let settings = Settings::load(&args.config)
        .with_context(|| format!("failed to load settings from {:?}", args.config))?;
    info!("Loaded {} blocks from {:?}", settings.access_control_rules.len(), args.config);

    let catalog = InMemoryCatalog::new(args.catalog.iter().cloned());
    let mut request = ActionRequest::new(kind, args.indices.iter().cloned());

    let mut builder = Request::builder().uri("/");
    if let Some(value) = &args.authorization {
        builder = builder.header(AUTHORIZATION, value.as_str());
    }
    let head = builder.body(()).context("invalid authorization header")?;
    let mut channel = BufferedChannel::new();

    let registry = RuleRegistry::default();
    let gate;
    let keeper;
    let outcome = if args.skip_authentication {
        gate = AuthorizationGate::from_settings(&settings, &registry)?;
        gate.apply(
            &args.action,
            &mut request,
            Inbound::rest(&head, &mut channel),
            &catalog,
        )?
    } else {
        keeper = Gatekeeper::with_registry(&settings, &registry)?;
        keeper.handle(
            &args.action,
            &mut request,
            Inbound::rest(&head, &mut channel),
            &catalog,
        )?
    };

    let allowed = outcome.is_allowed();
    let (label, block) = match &outcome {
        GateOutcome::PassThrough => ("pass-through", None),
        GateOutcome::Allowed(exit) => ("allowed", exit.block()),
        GateOutcome::Rejected { exit, .. } => ("rejected", exit.block()),
        GateOutcome::Unauthenticated(_) => ("unauthenticated", None),
    };

    let response = channel.last();
    let decision = Decision {
        action: args.action.clone(),
        outcome: label,
        block: block.map(|b| b.name().to_string()),
        indices: request.indices.iter().cloned().collect(),
        status: response.map(|r| r.status().as_u16()),
        response: response.map(|r| r.body().clone()),
    };
    println!("{}", serde_json::to_string_pretty(&decision)?);

    Ok(if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
