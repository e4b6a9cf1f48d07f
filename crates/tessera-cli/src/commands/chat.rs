//! Streamed completion against the real provider endpoint.

use std::io::{self, Write};

use anyhow::Context;
use futures::StreamExt;

use tessera_providers::{Client, StreamEvent};

use crate::{AppContext, CallArgs};

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub async fn run(args: &CallArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let api_key = ctx.config.api_key(&args.provider).with_context(|| {
        format!(
            "No API key for '{}'. Set it in ~/.config/tessera/config.toml or the provider's environment variable",
            args.provider
        )
    })?;

    let client = Client::http(ctx.registry.clone());
    let mut session = super::session_builder(args, ctx, client)?
        .api_key(api_key)
        .build()?;

    let mut handle = session.prompt(args.prompt.as_str())?;
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let mut thinking = false;

    while let Some(event) = handle.next().await {
        match event {
            StreamEvent::ThinkingDelta { delta } => {
                if !thinking {
                    write!(stderr, "{}", DIM)?;
                    thinking = true;
                }
                write!(stderr, "{}", delta)?;
                stderr.flush()?;
            }
            StreamEvent::TextDelta { delta } => {
                if thinking {
                    writeln!(stderr, "{}", RESET)?;
                    thinking = false;
                }
                write!(stdout, "{}", delta)?;
                stdout.flush()?;
            }
            StreamEvent::Error { error } => {
                if thinking {
                    writeln!(stderr, "{}", RESET)?;
                }
                if let Some(hint) = error.recovery_suggestion() {
                    eprintln!("hint: {}", hint);
                }
                return Err(error.into());
            }
            _ => {}
        }
    }
    if thinking {
        writeln!(stderr, "{}", RESET)?;
    }
    println!();

    let completion = handle.result().await?;
    for call in &completion.tool_calls {
        eprintln!("tool call {} {}({})", call.id, call.name, call.arguments);
    }
    session.record(&completion);

    let usage = session.usage();
    eprintln!(
        "{}{} in ({} cached) / {} out, finish {:?}, ${:.6}{}",
        DIM,
        usage.prompt_tokens,
        usage.cached_tokens,
        usage.completion_tokens,
        completion.finish_reason,
        usage.cost(&session.model().cost),
        RESET
    );
    Ok(())
}
