//! `chatcell` - resolve one image variant of a chat message.
//!
//! Reads a message manifest, looks the variant up in the local cache and
//! downloads it when it is not there yet.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatcell_core::config::default_config_path;
use chatcell_core::{
    CacheConfig, ChatMessage, DecodedImage, HttpTransport, ImageResolver, ImageVariant, MessageId,
    MessageList, MessageManifest,
};

/// Resolve one image variant of a chat message, downloading it when needed.
#[derive(Parser, Debug)]
#[command(name = "chatcell", version, about)]
struct Args {
    /// JSON manifest listing the messages
    manifest: PathBuf,

    /// Id of the image message
    #[arg(value_parser = parse_message_id)]
    message: MessageId,

    /// Variant to resolve: thumb, large or origin
    #[arg(default_value = "thumb")]
    variant: ImageVariant,

    /// Config file (defaults to chatcell/config.json in the platform config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn parse_message_id(s: &str) -> Result<MessageId, std::num::ParseIntError> {
    s.parse().map(MessageId)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatcell=info,chatcell_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    debug!("Cache directory: {}", config.cache_dir.display());

    let manifest = MessageManifest::load(&args.manifest)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;
    let mut list = MessageList::new();
    for message in manifest.into_messages() {
        list.push(message);
    }
    info!("Loaded {} messages", list.len());

    let resolver = ImageResolver::from_config(&config);
    let image = match list.resolve_image(args.message, args.variant, &resolver) {
        Ok(image) => {
            info!("{} found in cache", args.variant);
            image
        }
        Err(e) if e.needs_fetch() => {
            download(&mut list, &resolver, &config, args.message, args.variant).await?
        }
        Err(e) => return Err(e).with_context(|| format!("message {}", args.message)),
    };

    let path = list
        .get(args.message)
        .and_then(ChatMessage::image_state)
        .and_then(|state| state.record(args.variant))
        .and_then(|record| record.local_path.clone());
    match path {
        Some(path) => println!("{}x{} {}", image.width(), image.height(), path.display()),
        None => println!("{}x{} (not cached)", image.width(), image.height()),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CacheConfig> {
    let config = match path {
        Some(path) => CacheConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => match default_config_path() {
            Some(path) => CacheConfig::load(&path)?,
            None => CacheConfig::default(),
        },
    };
    Ok(config)
}

async fn download(
    list: &mut MessageList,
    resolver: &ImageResolver,
    config: &CacheConfig,
    message: MessageId,
    variant: ImageVariant,
) -> anyhow::Result<DecodedImage> {
    let transport = Arc::new(HttpTransport::new(config)?);
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();

    if !list.request_image(message, variant, resolver, &transport, &events_tx) {
        bail!("{variant} of message {message} has no remote locator");
    }

    let _progress = list
        .get(message)
        .and_then(ChatMessage::image_state)
        .map(|state| {
            state
                .progress(variant)
                .subscribe(move |percent: &u8| info!("{variant}: {percent}%"))
        });

    while let Some(event) = events_rx.recv().await {
        if let Some(outcome) = list.apply(resolver, event) {
            return Ok(outcome?);
        }
    }
    bail!("download of {variant} stopped without a result")
}
