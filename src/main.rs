use mimalloc::MiMalloc;
use std::sync::Arc;
use story_synth::{Config, GenerativeClient, StaticKey};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USAGE: &str = "usage:
  story-synth text <prompt>
  story-synth portrait <subject-id> <description> [--force]
  story-synth delete <subject-id>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        base_url = %cfg.provider.base_url,
        text_model = %cfg.provider.text_model,
        image_model = %cfg.provider.image_model,
        assets_dir = %cfg.basic.assets_dir.display(),
        api_key_set = !cfg.basic.api_key.trim().is_empty()
    );

    let client = GenerativeClient::new(&cfg, Arc::new(StaticKey::new(cfg.basic.api_key.clone())))?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["text", prompt] => {
            let text = client.generate_text(prompt).await.inspect_err(|e| {
                error!(error = %e, "text generation failed");
            })?;
            println!("{text}");
        }
        ["portrait", subject_id, description, rest @ ..]
            if rest.is_empty() || rest == ["--force"] =>
        {
            let force = rest == ["--force"];
            let path = client
                .generate_character_portrait(description, subject_id, force)
                .await
                .inspect_err(|e| {
                    error!(error = %e, "portrait generation failed");
                })?;
            println!("{}", path.display());
        }
        ["delete", subject_id] => {
            client.delete_asset(subject_id).await?;
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
    Ok(())
}
