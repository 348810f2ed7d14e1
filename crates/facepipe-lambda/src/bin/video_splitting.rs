use facepipe_io::{FfmpegExtractor, LambdaInvoker, S3Store};
use facepipe_lambda::{init_function_logging, Config, FrameSplitter, Response};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_function_logging();

    let config = Config::from_env();
    tracing::info!(
        intermediate_bucket = %config.intermediate_bucket,
        recognition_function = %config.recognition_function,
        ffmpeg = %config.ffmpeg_path.display(),
        "video-splitting starting"
    );

    let store = S3Store::from_env(config.s3_endpoint_url.as_deref(), config.s3_force_path_style).await;
    let extractor = FfmpegExtractor::new(&config.ffmpeg_path, config.frame_width, config.frame_height);
    let invoker = LambdaInvoker::from_env().await;
    let splitter = Arc::new(FrameSplitter::new(store, extractor, invoker, config.split_settings()));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let splitter = Arc::clone(&splitter);
        async move { Ok::<Response, Error>(splitter.handle(&event.payload).await) }
    }))
    .await
}
