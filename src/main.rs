use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use transcribe_api::config::{
    HandlerConfig, MetricsConfig, ServerConfig, TranscoderConfig, TranscriptionConfig,
};
use transcribe_api::config_loader::{load_config, CONFIG_FILE_PATH};
use transcribe_api::config_validator::ConfigValidator;
use transcribe_api::handlers::configure;
use transcribe_api::metrics::{create_metrics_exporter, Metrics};
use transcribe_api::pipeline::TranscriptionPipeline;
use transcribe_api::scratch::ScratchStorage;
use transcribe_api::{FfmpegTranscoder, OpenAiTranscriber, StartupError};

/// Build the shared pipeline, failing on anything that would break every request
fn build_pipeline(
    handler_config: &HandlerConfig,
    transcoder_config: &TranscoderConfig,
    transcription_config: &TranscriptionConfig,
    metrics: &Metrics,
) -> Result<TranscriptionPipeline, StartupError> {
    let scratch = ScratchStorage::new(&handler_config.temp_dir);
    scratch.ensure_dir()?;

    let transcriber = OpenAiTranscriber::new(transcription_config)?;
    info!(
        "Transcription service: {} (model {})",
        transcriber.endpoint(),
        transcriber.model()
    );

    let mut pipeline = TranscriptionPipeline::new(scratch, Arc::new(transcriber), metrics.clone())
        .with_timeout(handler_config.request_timeout());

    if transcoder_config.enabled {
        let transcoder = FfmpegTranscoder::from_config(transcoder_config)?;
        info!("Transcoding enabled with {}", transcoder.executable().display());
        pipeline = pipeline.with_transcoder(Arc::new(transcoder));
    }

    Ok(pipeline)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Load configuration file, environment variables take precedence
    if !load_config() {
        info!(
            "No configuration file loaded from {}, using environment and defaults",
            CONFIG_FILE_PATH
        );
    }

    if let Err(results) = ConfigValidator::validate_critical() {
        error!(
            "Refusing to start: {} configuration error(s)",
            results.errors.len()
        );
        std::process::exit(1);
    }

    let server_config = ServerConfig::default();
    let handler_config = HandlerConfig::default();
    let transcoder_config = TranscoderConfig::default();
    let transcription_config = TranscriptionConfig::default();
    let metrics_config = MetricsConfig::default();

    // Initialize metrics
    let metrics = Metrics::new(create_metrics_exporter(&metrics_config.exporter_type));

    let pipeline = match build_pipeline(
        &handler_config,
        &transcoder_config,
        &transcription_config,
        &metrics,
    ) {
        Ok(pipeline) => web::Data::new(pipeline),
        Err(e) => {
            error!("Refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    let keep_alive = Duration::from_secs(server_config.keep_alive);
    if handler_config.request_timeout().is_none() {
        warn!("Request timeout disabled, a stuck request holds its scratch files until the client leaves");
    }

    info!(
        "Starting Transcribe API server on http://{}",
        server_config.bind_address()
    );
    info!("Using scratch directory: {}", pipeline.scratch().dir().display());
    info!(
        "Transcoding: {}",
        if pipeline.transcoding_enabled() { "enabled" } else { "disabled" }
    );
    info!("Upload limit: {} bytes", handler_config.max_file_size);
    info!("Metrics exporter: {}", metrics_config.exporter_type);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(pipeline.clone())
            .app_data(web::Data::new(handler_config.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .configure(configure)
    })
    .workers(server_config.worker_count())
    .bind(server_config.bind_address())?
    .keep_alive(keep_alive)
    .run()
    .await
}
