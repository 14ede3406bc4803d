use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Args, Parser, Subcommand};
use doodle_contracts::events::EventWriter;
use doodle_contracts::wire::GenerateBody;
use doodle_engine::config::{credential_keys, max_body_bytes, non_empty_env, selected_provider};
use doodle_engine::{Generator, GenerationOutcome, ImageReference, ProviderConfig, ProviderKind};
use tracing_subscriber::EnvFilter;

mod server;

#[derive(Debug, Parser)]
#[command(name = "doodle", version, about = "Turn a sketch into a finished image")]
struct Cli {
    /// Image provider; defaults to DOODLE_PROVIDER, then openai.
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Providers,
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    sketch: PathBuf,
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long)]
    imagination: Option<f64>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: SocketAddr,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("doodle error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let kind = match cli.provider {
        Some(kind) => kind,
        None => selected_provider(non_empty_env).map_err(anyhow::Error::msg)?,
    };

    match cli.command {
        Command::Providers => {
            print_providers(kind);
            Ok(0)
        }
        Command::Generate(args) => runtime()?.block_on(run_generate(kind, args)),
        Command::Serve(args) => {
            let generator = build_generator(kind, args.events);
            let body_limit = max_body_bytes(non_empty_env);
            runtime()?.block_on(server::serve(Arc::new(generator), args.bind, body_limit))?;
            Ok(0)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn build_generator(kind: ProviderKind, events: Option<PathBuf>) -> Generator {
    let generator = Generator::new(ProviderConfig::from_env(kind));
    match events {
        Some(path) => generator.with_journal(EventWriter::new(path)),
        None => generator,
    }
}

fn print_providers(active: ProviderKind) {
    for kind in ProviderKind::ALL {
        let config = ProviderConfig::from_env(kind);
        let status = if config.is_configured() {
            "configured".to_string()
        } else {
            format!("missing {}", credential_keys(kind).join(" or "))
        };
        let marker = if kind == active { "*" } else { " " };
        println!("{marker} {:<10} {status}", kind.name());
    }
}

async fn run_generate(kind: ProviderKind, args: GenerateArgs) -> Result<i32> {
    let sketch = sketch_data_url(&args.sketch)?;
    let mut body = GenerateBody::new(sketch, args.prompt);
    if let Some(imagination) = args.imagination {
        body = body.with_imagination(imagination);
    }

    let generator = build_generator(kind, args.events);
    let image_ref = match generator.generate(&body).await {
        GenerationOutcome::Complete { image_ref } => image_ref,
        GenerationOutcome::Failed { reason, detail } => {
            eprintln!("generation failed ({reason}): {detail}");
            return Ok(1);
        }
    };

    match &args.out {
        Some(out) => {
            write_image(&image_ref, out).await?;
            println!("{}", out.display());
        }
        None => println!("{}", image_ref.to_client_string()),
    }
    Ok(0)
}

fn sketch_data_url(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.is_empty() {
        bail!("sketch file {} is empty", path.display());
    }
    let mime_type = image::ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/png");
    Ok(format!("data:{mime_type};base64,{}", BASE64.encode(bytes)))
}

async fn write_image(image_ref: &ImageReference, out: &Path) -> Result<()> {
    let bytes = match image_ref {
        ImageReference::InlineData { data, .. } => BASE64
            .decode(data.trim())
            .context("provider returned invalid base64 image data")?,
        ImageReference::Url { url } => {
            let response = reqwest::get(url)
                .await
                .with_context(|| format!("failed to download {url}"))?
                .error_for_status()
                .with_context(|| format!("download of {url} failed"))?;
            response.bytes().await?.to_vec()
        }
    };
    if let Some(parent) = out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(out, bytes).with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}
