use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facepipe_core::{EuclideanMatcher, Gallery, Matcher};
use facepipe_io::{ChannelInvoker, FfmpegExtractor, FsStore, Invoker, LambdaInvoker, ObjectStore, S3Store};
use facepipe_lambda::{spawn_engine, Config, FaceRecognition, FrameSplitter, Response};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "facepipe", about = "Video frame extraction and face recognition pipeline")]
struct Cli {
    /// Serve buckets from `<DIR>/<bucket>/<key>` instead of S3
    #[arg(long, global = true, value_name = "DIR")]
    local_store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a frame from a stored video and hand it off
    Split {
        /// Bucket holding the video
        #[arg(short, long)]
        bucket: String,
        /// Key of the video
        #[arg(short, long)]
        key: String,
    },
    /// Recognize the face in a stored frame
    Recognize {
        /// Key of the frame
        #[arg(short, long)]
        key: String,
        /// Bucket holding the frame (default: the intermediate bucket)
        #[arg(short, long)]
        bucket: Option<String>,
    },
    /// Run both stages on a local video file against a local store
    Pipeline {
        /// Video file to process
        video: PathBuf,
        /// Store directory (default: --local-store, else ./facepipe-store)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Bucket the video is placed in before splitting
        #[arg(long, default_value = "videos-in")]
        input_bucket: String,
    },
    /// Match the primary face of a local image against the gallery
    Match {
        /// Image file
        image: PathBuf,
        /// Gallery file (default: FACEPIPE_GALLERY_PATH)
        #[arg(long)]
        gallery: Option<PathBuf>,
    },
    /// Show the contents of a gallery file
    Gallery {
        /// Gallery file (default: FACEPIPE_GALLERY_PATH)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Split { bucket, key } => {
            let event = storage_event(&bucket, &key);
            let store = open_store(&config, cli.local_store.as_deref()).await;
            let resp = match cli.local_store {
                Some(_) => {
                    let (invoker, mut rx) = ChannelInvoker::new();
                    let resp = split(&config, store, invoker, &event).await;
                    while let Ok(invocation) = rx.try_recv() {
                        println!(
                            "hand-off to {}: {}",
                            invocation.function,
                            String::from_utf8_lossy(&invocation.payload)
                        );
                    }
                    resp
                }
                None => split(&config, store, LambdaInvoker::from_env().await, &event).await,
            };
            report(&resp)?;
        }
        Commands::Recognize { key, bucket } => {
            let store = open_store(&config, cli.local_store.as_deref()).await;
            let stage = recognition(&config, store)?;
            let mut payload = json!({ "img_file_name": key });
            if let Some(bucket) = bucket {
                payload["bucket_name"] = Value::String(bucket);
            }
            report(&stage.handle(&payload).await)?;
        }
        Commands::Pipeline {
            video,
            store,
            input_bucket,
        } => {
            let root = store
                .or(cli.local_store)
                .unwrap_or_else(|| PathBuf::from("facepipe-store"));
            run_pipeline(&config, &root, &video, &input_bucket).await?;
        }
        Commands::Match { image, gallery } => {
            let gallery_path = gallery.unwrap_or_else(|| config.gallery_path.clone());
            let gallery = Gallery::load(&gallery_path)
                .with_context(|| format!("loading {}", gallery_path.display()))?;
            let engine = spawn_engine(&config.scrfd_model_path(), &config.arcface_model_path())?;

            let Some(embedding) = engine.analyze_image(&image).await? else {
                println!("No face detected in {}", image.display());
                return Ok(());
            };
            let nearest = EuclideanMatcher.nearest(&embedding, &gallery)?;
            println!("Nearest:  {} (entry {})", nearest.name, nearest.index);
            println!("Distance: {:.4}", nearest.distance);
            if let Some(max) = config.max_distance {
                let verdict = if nearest.within(Some(max)) { "accepted" } else { "rejected" };
                println!("Cutoff:   {max:.4} ({verdict})");
            }
        }
        Commands::Gallery { path } => {
            let path = path.unwrap_or_else(|| config.gallery_path.clone());
            let gallery = Gallery::load(&path).with_context(|| format!("loading {}", path.display()))?;
            println!("{}: {} entries, {} dimensions", path.display(), gallery.len(), gallery.dim().unwrap_or(0));
            for (i, name) in gallery.names().iter().enumerate() {
                println!("  {i:>4}  {name}");
            }
        }
    }

    Ok(())
}

async fn open_store(config: &Config, local: Option<&Path>) -> Arc<dyn ObjectStore> {
    match local {
        Some(root) => Arc::new(FsStore::new(root)),
        None => Arc::new(S3Store::from_env(config.s3_endpoint_url.as_deref(), config.s3_force_path_style).await),
    }
}

async fn split<I: Invoker>(config: &Config, store: Arc<dyn ObjectStore>, invoker: I, event: &Value) -> Response {
    let extractor = FfmpegExtractor::new(&config.ffmpeg_path, config.frame_width, config.frame_height);
    FrameSplitter::new(store, extractor, invoker, config.split_settings())
        .handle(event)
        .await
}

fn recognition(
    config: &Config,
    store: Arc<dyn ObjectStore>,
) -> Result<FaceRecognition<Arc<dyn ObjectStore>, facepipe_lambda::EngineHandle>> {
    let engine = spawn_engine(&config.scrfd_model_path(), &config.arcface_model_path())?;
    Ok(FaceRecognition::new(store, engine, config.recognize_settings()))
}

/// Place `video` in the local store, split it, then feed every queued
/// hand-off to the recognition stage in-process.
async fn run_pipeline(config: &Config, root: &Path, video: &Path, input_bucket: &str) -> Result<()> {
    let name = video
        .file_name()
        .and_then(|n| n.to_str())
        .context("video path has no UTF-8 file name")?;
    let bucket_dir = root.join(input_bucket);
    std::fs::create_dir_all(&bucket_dir).with_context(|| format!("creating {}", bucket_dir.display()))?;
    std::fs::copy(video, bucket_dir.join(name)).with_context(|| format!("copying {}", video.display()))?;
    tracing::info!(store = %root.display(), bucket = input_bucket, key = name, "video staged");

    let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(root));
    let (invoker, mut rx) = ChannelInvoker::new();
    let resp = split(config, Arc::clone(&store), invoker, &storage_event(input_bucket, name)).await;
    report(&resp)?;

    let stage = recognition(config, store)?;
    while let Ok(invocation) = rx.try_recv() {
        tracing::info!(function = %invocation.function, "delivering hand-off");
        let payload: Value = serde_json::from_slice(&invocation.payload).context("decoding hand-off payload")?;
        report(&stage.handle(&payload).await)?;
    }
    println!("Results under {}", root.join(&config.output_bucket).display());
    Ok(())
}

fn storage_event(bucket: &str, key: &str) -> Value {
    json!({ "Records": [{ "s3": { "bucket": { "name": bucket }, "object": { "key": key } } }] })
}

fn report(resp: &Response) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(resp)?);
    if resp.status_code != Response::OK {
        bail!("stage returned status {}", resp.status_code);
    }
    Ok(())
}
