use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use exam_answer_service::{
    api::{create_router, AppState},
    config::LoggingConfig,
    log_system_event, Config, LLMService, OcrSpaceClient, SolveService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging with optional daily-rotated file output
    let _guard = setup_logging(&LoggingConfig::from_env())?;

    let config = Config::from_env()?;
    config.validate()?;

    let ocr = OcrSpaceClient::new(config.ocr.clone());
    let llm = LLMService::new(&config.llm);
    log_system_event!(
        startup,
        component = "llm",
        format!("provider={} model={}", llm.provider_name(), llm.model_name())
    );
    let solver = SolveService::new(llm, config.solve.clone());

    let app = create_router(AppState { ocr, solver });

    // Start the server
    let addr = config.server.address();
    log_system_event!(startup, component = "server", format!("listening on {addr}"));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_system_event!(shutdown, component = "server", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use std::fs;
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .boxed()
    });

    let mut guard = None;
    let file_layer = if config.file_enabled {
        // Create logs directory if it doesn't exist
        fs::create_dir_all(&config.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create logs directory: {}", e);
        });

        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "exam-answer-service.log");
        let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        // No ANSI colors for files
        Some(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(non_blocking_file)
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    log_system_event!(
        startup,
        component = "logging",
        format!(
            "console={} file={} directory={}",
            config.console_enabled, config.file_enabled, config.log_directory
        )
    );

    Ok(guard)
}
