use facepipe_io::S3Store;
use facepipe_lambda::{init_function_logging, spawn_engine, Config, FaceRecognition, Response};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_function_logging();

    let config = Config::from_env();
    tracing::info!(
        output_bucket = %config.output_bucket,
        models = %config.model_dir.display(),
        gallery = %config.gallery_path.display(),
        max_distance = ?config.max_distance,
        "face-recognition starting"
    );

    // Models load once per process; the gallery loads on the first request.
    let engine = spawn_engine(&config.scrfd_model_path(), &config.arcface_model_path())?;
    let store = S3Store::from_env(config.s3_endpoint_url.as_deref(), config.s3_force_path_style).await;
    let stage = Arc::new(FaceRecognition::new(store, engine, config.recognize_settings()));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let stage = Arc::clone(&stage);
        async move { Ok::<Response, Error>(stage.handle(&event.payload).await) }
    }))
    .await
}
