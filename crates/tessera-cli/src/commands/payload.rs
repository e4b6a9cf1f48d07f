//! Dry run: build the request body and print it without touching the network.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use tessera_core::WireApi;
use tessera_providers::{Client, ScriptedTransport};

use crate::{AppContext, CallArgs};

/// A finished, empty reply so the scripted stream settles.
fn finished_chunk(api: WireApi) -> Value {
    match api {
        WireApi::AnthropicMessages => json!({
            "type": "message_delta",
            "delta": {"stop_reason": "end_turn"},
            "usage": {"output_tokens": 0}
        }),
        WireApi::OpenAiCompletions => json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
    }
}

pub async fn run(args: &CallArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let api = super::resolve_model(args, ctx)?.api;
    let transport = Arc::new(ScriptedTransport::replay(vec![finished_chunk(api)]));
    let client = Client::new(ctx.registry.clone(), transport.clone());

    let observed: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let sink = observed.clone();
    // Credentials are never sent; a placeholder keeps the builder happy.
    let api_key = ctx
        .config
        .api_key(&args.provider)
        .unwrap_or_else(|| "dry-run".to_string());

    let mut session = super::session_builder(args, ctx, client)?
        .api_key(api_key)
        .on_payload(Arc::new(move |payload: &Value| {
            *sink.lock() = Some(payload.clone());
        }))
        .build()?;

    let handle = session.prompt(args.prompt.as_str())?;
    if let Err(e) = handle.result().await {
        tracing::debug!("Scripted reply did not settle: {}", e);
    }

    let payload = observed
        .lock()
        .take()
        .ok_or_else(|| anyhow::anyhow!("No payload was built"))?;
    if let Some(request) = transport.last_request() {
        eprintln!("POST {}", request.url);
    }
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
