//! regsync: reconcile schema registries and registry policies.
//!
//! Each `invoke` is one stateless handler invocation. An in-progress result
//! leaves its callback context on disk; invoking again resumes from it.
//! `drive` runs the whole chain in-process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use regsync_engine::{Action, HandlerRequest, ProgressEvent, RegistryHandler};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regsync_host::{load_config, runner, store, ActionArg, Overrides, ResourceType};

/// regsync reconciliation host
#[derive(Parser, Debug)]
#[command(name = "regsync", version, about)]
struct Args {
    /// Engine config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Stale polls allowed before stabilization fails
    #[arg(long, global = true)]
    retry_budget: Option<u32>,

    /// Seconds to wait before redelivering an in-progress context
    #[arg(long, global = true)]
    callback_delay_secs: Option<u64>,

    /// Backend state file
    #[arg(long, global = true, default_value = "regsync-state.json")]
    state: PathBuf,

    /// Reads a policy write stays invisible (updates the backend state)
    #[arg(long, global = true)]
    visibility_lag: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one invocation and print its outcome
    Invoke {
        #[arg(value_enum)]
        resource: ResourceType,
        #[arg(value_enum)]
        action: ActionArg,
        #[command(flatten)]
        target: Target,
        /// Callback context file
        #[arg(long, default_value = "regsync-context.json")]
        context: PathBuf,
    },
    /// Invoke until the operation succeeds or fails
    Drive {
        #[arg(value_enum)]
        resource: ResourceType,
        #[arg(value_enum)]
        action: ActionArg,
        #[command(flatten)]
        target: Target,
        /// Multiplier for the requested callback delay
        #[arg(long, default_value = "1.0")]
        delay_scale: f64,
    },
    /// List one page of registries
    List {
        #[arg(long)]
        next_token: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Desired model (JSON)
    #[arg(long)]
    model: PathBuf,

    /// Logical resource id used to derive a registry name
    #[arg(long)]
    logical_id: Option<String>,

    /// Client request token (auto-generated by drive if not provided)
    #[arg(long)]
    request_token: Option<String>,
}

impl Target {
    async fn request(&self, generate_token: bool) -> Result<HandlerRequest> {
        let mut request = HandlerRequest::new(store::load_model(&self.model).await?);
        request.logical_resource_id = self.logical_id.clone();
        request.client_request_token = self.request_token.clone().or_else(|| {
            generate_token.then(|| uuid::Uuid::new_v4().to_string())
        });
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the outcome.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regsync=info,regsync_host=info,regsync_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = load_config(
        args.config.as_deref(),
        &Overrides {
            retry_budget: args.retry_budget,
            callback_delay_secs: args.callback_delay_secs,
        },
    )
    .await?;

    let backend = Arc::new(store::load_backend(&args.state).await?);
    if let Some(lag) = args.visibility_lag {
        info!("Setting backend visibility lag to {}", lag);
        backend.set_visibility_lag(lag).await;
    }

    let outcome = match &args.command {
        Command::Invoke {
            resource,
            action,
            target,
            context,
        } => {
            let handler = runner::handler_for(*resource, backend.clone(), config);
            let request = target.request(false).await?;
            let event =
                runner::invoke_once(handler.as_ref(), Action::from(*action), request, context)
                    .await?;
            Some(event)
        }
        Command::Drive {
            resource,
            action,
            target,
            delay_scale,
        } => {
            let handler = runner::handler_for(*resource, backend.clone(), config);
            let request = target.request(true).await?;
            let event =
                runner::drive(handler.as_ref(), Action::from(*action), request, *delay_scale)
                    .await;
            Some(event)
        }
        Command::List { next_token } => {
            let handler = RegistryHandler::new(backend.clone(), config);
            match handler.list(next_token.clone()).await {
                Ok(page) => {
                    println!("{}", serde_json::to_string_pretty(&page)?);
                    None
                }
                Err(e) => Some(ProgressEvent::failed(e)),
            }
        }
    };

    store::save_backend(&backend, &args.state).await?;

    if let Some(event) = outcome {
        println!("{}", serde_json::to_string_pretty(&event)?);
        if let ProgressEvent::Failed { error } = &event {
            error!("Operation failed: {}", error);
            std::process::exit(1);
        }
    }

    Ok(())
}
