//! pixrelay: ask a vision model about local images and let it publish them to Slack.
//!
//! Configuration comes from the environment (or a .env file); see `pixrelay_core::Config`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pixrelay_cli::{error_json, init_tracing, log_error, payload_summary, report_json};
use pixrelay_core::models::ValidationPolicy;
use pixrelay_core::{AppError, Config, ErrorMetadata};
use pixrelay_processing::{IntakeValidator, RequestAssembler};
use pixrelay_services::{
    ChatCompletionClient, ImageChatService, MessagingService, SlackClient, ToolDispatcher,
};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pixrelay", about = "Ask a vision model about local images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message and images to the model and print its reply
    Ask {
        /// Message for the model (defaults to "What's in this image?")
        #[arg(long, short, default_value = "")]
        message: String,
        /// Image files, labelled Image 1..N in order
        #[arg(required = true)]
        images: Vec<String>,
    },
    /// Check images against the intake limits
    Validate {
        /// Image files to check
        #[arg(required = true)]
        images: Vec<String>,
        /// Report every image instead of stopping at the first failure
        #[arg(long)]
        all: bool,
    },
    /// Build the request payload without calling the model
    Payload {
        /// Message for the model
        #[arg(long, short, default_value = "")]
        message: String,
        /// Image files
        #[arg(required = true)]
        images: Vec<String>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn output(value: &impl Serialize) -> Result<(), AppError> {
    print_json(value).map_err(AppError::from)
}

fn build_service(config: &Config) -> Result<ImageChatService, AppError> {
    let chat = ChatCompletionClient::new(&config.chat, config.http_timeout())
        .map_err(|e| AppError::Configuration(format!("{:#}", e)))?;

    let messaging = match &config.slack {
        Some(slack) => {
            let client = SlackClient::new(slack, config.http_timeout())
                .map_err(|e| AppError::Configuration(format!("{:#}", e)))?;
            Some(Arc::new(client) as Arc<dyn MessagingService>)
        }
        None => {
            tracing::info!("SLACK_BOT_TOKEN not set, image upload tool disabled");
            None
        }
    };

    Ok(ImageChatService::new(
        ValidationPolicy::default(),
        config.assembly,
        Arc::new(chat),
        ToolDispatcher::new(messaging),
    ))
}

async fn run(command: Commands, config: Config) -> Result<ExitCode, AppError> {
    match command {
        Commands::Ask { message, images } => {
            let service = build_service(&config)?;
            let reply = service.ask(&message, &images).await?;
            output(&reply)?;
        }
        Commands::Validate { images, all } => {
            let validator = IntakeValidator::new(ValidationPolicy::default());
            if all {
                let report = validator.validate_all(&images);
                output(&report_json(&report))?;
                if !report.is_valid() {
                    // Same exit status the fail-fast path would give for the first error
                    let code = report
                        .into_result()
                        .err()
                        .map(|e| AppError::from(e).exit_code())
                        .unwrap_or(1);
                    return Ok(ExitCode::from(code));
                }
            } else {
                let candidates = validator.validate(&images)?;
                output(&serde_json::json!({ "valid": true, "images": candidates }))?;
            }
        }
        Commands::Payload { message, images } => {
            IntakeValidator::new(ValidationPolicy::default()).validate(&images)?;
            let payload = RequestAssembler::new(config.assembly)
                .build_payload(&message, &images)
                .await?;
            output(&payload_summary(&payload))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config::from_env();
    init_tracing(config.as_ref().map(Config::is_production).unwrap_or(false));

    let result = match config {
        Ok(config) => {
            tracing::debug!(environment = %config.environment, "Configuration loaded");
            run(cli.command, config).await
        }
        Err(e) => Err(AppError::Configuration(format!("{:#}", e))),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            log_error(&err);
            if let Err(e) = print_json(&error_json(&err)) {
                eprintln!("{:#}", e);
            }
            ExitCode::from(err.exit_code())
        }
    }
}
