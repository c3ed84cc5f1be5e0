//! Replay newline-delimited event envelopes against an in-memory store.
//!
//! Collaborators only log, so a replay shows which transitions and side
//! effects a sequence of events would produce. One JSON line is printed per
//! event.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application_intake::domain::{ApplicationRecord, CaseDocument};
use application_intake::kernel::dry_run::{
    EnvSecretStore, LoggingCaseClient, LoggingCaseDocumentStore, LoggingNotifier, LoggingPublisher,
};
use application_intake::kernel::{EngineDeps, SystemClock, UuidIds};
use application_intake::store::{MemoryStore, SecondaryIndexRecord};
use application_intake::{Config, Engine, EventEnvelope, Outcome};
use secret_cache::{SecretCache, SecretStore};

#[derive(Parser)]
#[command(name = "intake-replay")]
#[command(about = "Replay event envelopes through the intake engine without side effects")]
struct Cli {
    /// File of newline-delimited envelopes, or `-` for stdin
    input: PathBuf,

    /// JSON file with `applications` and `cases` to load before replaying
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Secret value as NAME=VALUE; falls back to SECRET_<NAME> in the environment
    #[arg(long = "secret", value_parser = parse_secret)]
    secrets: Vec<(String, String)>,

    /// Print every stored item once the replay finishes
    #[arg(long)]
    dump: bool,
}

#[derive(Default, Deserialize)]
struct Seed {
    #[serde(default)]
    applications: Vec<ApplicationRecord>,
    #[serde(default)]
    cases: Vec<CaseDocument>,
}

#[derive(Serialize)]
struct Line {
    line: usize,
    source: String,
    kind: String,
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Secrets from the command line first, then the environment.
struct ReplaySecrets {
    given: HashMap<String, String>,
    fallback: EnvSecretStore,
}

#[async_trait]
impl SecretStore for ReplaySecrets {
    async fn fetch(&self, name: &str) -> Result<String> {
        match self.given.get(name) {
            Some(value) => Ok(value.clone()),
            None => self.fallback.fetch(name).await,
        }
    }
}

fn parse_secret(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got {:?}", raw))?;
    Ok((name.to_string(), value.to_string()))
}

fn load_seed(path: Option<&PathBuf>) -> Result<Seed> {
    let Some(path) = path else {
        return Ok(Seed::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid seed file {}", path.display()))
}

fn open_input(path: &PathBuf) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,application_intake=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let seed = load_seed(cli.seed.as_ref())?;

    let store = Arc::new(MemoryStore::new());
    for record in seed.applications {
        if let Some(uid) = record.external_uid.clone() {
            store.seed(SecondaryIndexRecord::new(uid, record.key(), record.created_at));
        }
        store.seed(record);
    }
    let case_documents = Arc::new(LoggingCaseDocumentStore::new());
    for case in seed.cases {
        case_documents.insert(case);
    }

    let clock = Arc::new(SystemClock);
    let secrets = Arc::new(SecretCache::new(
        Arc::new(ReplaySecrets {
            given: cli.secrets.into_iter().collect(),
            fallback: EnvSecretStore,
        }),
        clock.clone(),
        config.cache_settings(),
    ));

    let deps = EngineDeps {
        store: store.clone(),
        case_client: Arc::new(LoggingCaseClient),
        case_documents,
        publisher: Arc::new(LoggingPublisher),
        notifier: Arc::new(LoggingNotifier),
        secrets,
        clock,
        ids: Arc::new(UuidIds),
    };
    let engine = Engine::new(deps, config.engine_settings())?;

    tracing::info!(seeded = store.len(), "Starting replay");

    let mut failures = 0;
    for (index, line) in open_input(&cli.input)?.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let number = index + 1;

        let envelope = match EventEnvelope::from_json(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                failures += 1;
                tracing::error!(line = number, error = %e, "Skipping unreadable envelope");
                continue;
            }
        };

        let (result, detail) = match engine.handle_with_deadline(&envelope).await {
            Ok(Outcome::Applied { performed }) => (
                "applied",
                Some(
                    performed
                        .iter()
                        .map(|step| step.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            ),
            Ok(Outcome::Skipped { reason }) => ("skipped", Some(reason.to_string())),
            Err(e) => {
                failures += 1;
                ("failed", Some(e.to_string()))
            }
        };

        println!(
            "{}",
            serde_json::to_string(&Line {
                line: number,
                source: envelope.source,
                kind: envelope.kind,
                result,
                detail,
            })?
        );
    }

    if cli.dump {
        for item in store.snapshot() {
            println!("{}", serde_json::to_string(&item)?);
        }
    }

    tracing::info!(failures, "Replay complete");
    Ok(())
}
