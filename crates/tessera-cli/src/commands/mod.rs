//! CLI command implementations.

pub mod chat;
pub mod models;
pub mod payload;

use std::sync::Arc;

use anyhow::Context;

use tessera_core::ModelDescriptor;
use tessera_providers::Client;
use tessera_session::{SessionBuilder, SettingsManager};

use crate::{AppContext, CallArgs};

/// Look up the model named on the command line.
fn resolve_model(args: &CallArgs, ctx: &AppContext) -> anyhow::Result<ModelDescriptor> {
    ctx.registry
        .require(&args.provider, &args.model)
        .cloned()
        .with_context(|| {
            format!(
                "Run 'tessera models --provider {}' to see available models",
                args.provider
            )
        })
}

/// Session builder for one CLI call.
///
/// Command-line flags override the configured settings.
fn session_builder(
    args: &CallArgs,
    ctx: &AppContext,
    client: Client,
) -> anyhow::Result<SessionBuilder> {
    let settings = SettingsManager::from_config(&ctx.config);
    if args.strict {
        settings.set_strict_reasoning(true);
    }
    if args.max_tokens.is_some() {
        settings.set_max_tokens(args.max_tokens);
    }

    let mut builder = SessionBuilder::new()
        .client(client)
        .settings(Arc::new(settings))
        .model(resolve_model(args, ctx)?);
    if let Some(preserve) = args.preserve_override() {
        builder = builder.preserve_thinking(preserve);
    }
    if let Some(reasoning) = args.reasoning {
        builder = builder.reasoning(reasoning);
    }
    if let Some(ref system) = args.system {
        builder = builder.system_prompt(system.clone());
    }
    Ok(builder)
}
