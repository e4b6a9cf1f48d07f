//! Catalog listing.

use tessera_core::InputModality;

use crate::AppContext;

pub fn run(provider: Option<&str>, ctx: &AppContext) -> anyhow::Result<()> {
    let providers: Vec<&str> = match provider {
        Some(p) => vec![p],
        None => ctx.registry.providers(),
    };

    for provider in providers {
        let models = ctx.registry.models(provider);
        if models.is_empty() {
            println!("{}: no models", provider);
            continue;
        }

        let key = if ctx.config.api_key(provider).is_some() {
            "configured"
        } else {
            "no api key"
        };
        println!("{} ({})", provider, key);
        for model in models {
            let mut traits = vec![model.api.as_str()];
            if model.reasoning {
                traits.push("reasoning");
            }
            if model.accepts(InputModality::Image) {
                traits.push("images");
            }
            println!(
                "  {:<28} {:<24} ctx {:>7}  out {:>6}  {}",
                model.id,
                model.name,
                model.context_window,
                model.max_tokens,
                traits.join(", ")
            );
        }
        println!();
    }
    Ok(())
}
