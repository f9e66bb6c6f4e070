//! ABOUTME: `soe` binary entry point — wires clap, logging, and the three CLI subcommands together
//! ABOUTME: Grounded on llmspell-cli's main.rs: parse args, init logging, dispatch, print, exit

mod cli;
mod model;

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::{Cli, Commands};
use soe_core::{ContextBackend, ExecutionId, StaticToolRegistry};
use soe_dispatch::{
    broadcast_signals, orchestrate, Backends, Collaborators, ExecutionConfig, OrchestrateRequest,
};
use soe_registry::RegistryDocument;
use soe_storage::{FileBackend, InMemoryBackend, TracingTelemetryBackend};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            workflow,
            initial_workflow,
            signals,
            show_fields,
            store,
        } => run(workflow, initial_workflow, signals, show_fields, store).await,
        Commands::Resume {
            execution_id,
            signals,
            store,
        } => resume(execution_id, signals, store).await,
        Commands::Inspect {
            execution_id,
            store,
        } => inspect(execution_id, store).await,
    }
}

/// `RUST_LOG` always wins; `-v`/`-vv` only raise the default when it's unset.
fn init_logging(verbose: u8) {
    if std::env::var("RUST_LOG").is_err() {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }
    if let Err(e) = soe_core::logging::init_logging() {
        eprintln!("warning: failed to initialize logging: {e}");
    }
}

fn default_collaborators() -> Collaborators {
    Collaborators {
        model: Arc::new(model::UnconfiguredModelCaller),
        tools: Arc::new(StaticToolRegistry::new()),
        history: None,
    }
}

async fn in_memory_backends() -> Backends {
    let backend = Arc::new(InMemoryBackend::new());
    Backends {
        context: backend.clone(),
        workflows: backend.clone(),
        schema: Some(backend.clone()),
        identities: Some(backend.clone()),
        telemetry: Some(backend),
    }
}

async fn file_backends(root: PathBuf) -> Result<Backends> {
    let backend = Arc::new(
        FileBackend::new(root)
            .await
            .context("failed to initialize file-backed storage")?,
    );
    Ok(Backends {
        context: backend.clone(),
        workflows: backend.clone(),
        schema: Some(backend.clone()),
        identities: Some(backend),
        telemetry: Some(Arc::new(TracingTelemetryBackend)),
    })
}

async fn run(
    workflow: PathBuf,
    initial_workflow: String,
    signals: Vec<String>,
    show_fields: Vec<String>,
    store: Option<PathBuf>,
) -> Result<()> {
    let doc = RegistryDocument::load_and_validate_file(&workflow)
        .await
        .with_context(|| format!("failed to load workflow document {}", workflow.display()))?;

    let backends = match store {
        Some(root) => file_backends(root).await?,
        None => in_memory_backends().await,
    };

    let request = OrchestrateRequest {
        initial_workflow_name: initial_workflow,
        initial_signals: signals,
        initial_context: Default::default(),
        config: Some(ExecutionConfig {
            registry: doc.registry,
            identities: doc.identities,
            context_schema: doc.context_schema,
        }),
        inherit_config_from_id: None,
        inherit_context_from_id: None,
    };

    let execution_id = orchestrate(request, default_collaborators(), backends.clone())
        .await
        .context("orchestration failed")?;

    println!("execution_id: {execution_id}");
    print_summary(&backends, execution_id, &show_fields).await?;
    Ok(())
}

async fn resume(execution_id: String, signals: Vec<String>, store: PathBuf) -> Result<()> {
    let execution_id = ExecutionId::from_str(&execution_id)
        .context("execution id must be a UUID printed by a prior run/resume")?;
    let backends = file_backends(store).await?;

    broadcast_signals(execution_id, signals, default_collaborators(), backends.clone())
        .await
        .context("resuming execution failed")?;

    println!("execution_id: {execution_id}");
    print_summary(&backends, execution_id, &[]).await?;
    Ok(())
}

async fn inspect(execution_id: String, store: PathBuf) -> Result<()> {
    let execution_id = ExecutionId::from_str(&execution_id)
        .context("execution id must be a UUID printed by a prior run/resume")?;
    let backends = file_backends(store).await?;

    let ctx = backends
        .context
        .get_context(execution_id)
        .await
        .context("failed to read persisted context")?
        .with_context(|| format!("no persisted context for execution '{execution_id}'"))?;

    let value = serde_json::Value::Object(ctx.to_current_value_map());
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn print_summary(
    backends: &Backends,
    execution_id: ExecutionId,
    show_fields: &[String],
) -> Result<()> {
    let ctx = backends
        .context
        .get_context(execution_id)
        .await
        .context("failed to read persisted context")?
        .with_context(|| format!("no persisted context for execution '{execution_id}'"))?;

    if let Some(operational) = soe_context::read_operational(&ctx).context("corrupt context")? {
        println!("signals dispatched: {:?}", operational.signals);
        println!(
            "node invocations: {:?}",
            operational.nodes.into_iter().collect::<std::collections::BTreeMap<_, _>>()
        );
        println!(
            "llm_calls={} tool_calls={} errors={}",
            operational.llm_calls, operational.tool_calls, operational.errors
        );
    }

    for field in show_fields {
        match ctx.current(field) {
            Some(value) => println!("{field} = {value}"),
            None => println!("{field} = <unset>"),
        }
    }

    Ok(())
}
