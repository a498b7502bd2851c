//! Pneumoscan CLI
//!
//! Entry point for the pneumonia detection service and its offline tools.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use pneumoscan::backend::{backend_name, default_device, DefaultBackend};
use pneumoscan::config::ServiceConfig;
use pneumoscan::inference::{evaluate_directory, is_allowed_extension, Predictor, Threshold};
use pneumoscan::model::{XrayClassifier, XrayClassifierConfig, DEFAULT_MODEL_PATH};
use pneumoscan::server::run_server;
use pneumoscan::storage::StoreKind;
use pneumoscan::utils::{format_elapsed, images_per_second};
use pneumoscan::utils::logging::{init_logging, LogConfig};

/// Chest X-ray pneumonia detection
///
/// Serves the classifier over HTTP and runs it on local files.
#[derive(Parser, Debug)]
#[command(name = "pneumoscan")]
#[command(version)]
#[command(about = "Chest X-ray pneumonia classification service", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false", global = true)]
    verbose: bool,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    ///
    /// Unset flags fall back to HOST, PORT/BACKEND_PORT, MODEL_PATH, MONGO_URI,
    /// PREDICTION_STORE, UPLOAD_DIR, FRONTEND_URL, THRESHOLD_FILE and
    /// MAX_UPLOAD_BYTES.
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to trained weights
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// MongoDB connection string
        #[arg(long)]
        mongo_uri: Option<String>,

        /// Prediction store backend
        #[arg(long, value_enum)]
        store: Option<StoreKind>,

        /// Directory uploads are copied to
        #[arg(long)]
        upload_dir: Option<PathBuf>,

        /// Do not keep copies of uploaded images
        #[arg(long, default_value = "false")]
        no_save_uploads: bool,

        /// Allowed CORS origin (any origin when unset)
        #[arg(long)]
        frontend_url: Option<String>,

        /// File containing a tuned decision threshold
        #[arg(long)]
        threshold_file: Option<PathBuf>,

        /// Maximum upload size in bytes
        #[arg(long)]
        max_upload_bytes: Option<usize>,
    },

    /// Run inference on a single image or directory
    Predict {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Path to trained weights
        #[arg(short, long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// File containing a tuned decision threshold
        #[arg(long, env = "THRESHOLD_FILE")]
        threshold_file: Option<PathBuf>,

        /// Print one JSON object per image instead of text
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Evaluate on a labeled directory with NORMAL/ and PNEUMONIA/ subfolders
    Evaluate {
        /// Root of the labeled data
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Path to trained weights
        #[arg(short, long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// File containing a tuned decision threshold
        #[arg(long, env = "THRESHOLD_FILE")]
        threshold_file: Option<PathBuf>,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a randomly initialized weights file (for demos and smoke tests)
    InitModel {
        /// Output weights path
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::for_output(std::io::stdout().is_terminal())
    };
    if let Some(level) = &cli.log_level {
        log_config = log_config.with_level(level);
    }

    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Serve {
            host,
            port,
            model,
            mongo_uri,
            store,
            upload_dir,
            no_save_uploads,
            frontend_url,
            threshold_file,
            max_upload_bytes,
        } => {
            let mut config = ServiceConfig::from_env();

            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(model) = model {
                config.model_path = model;
            }
            if let Some(uri) = mongo_uri {
                config.mongo_uri = uri;
            }
            if let Some(store) = store {
                config.store = store;
            }
            if let Some(dir) = upload_dir {
                config.upload_dir = Some(dir);
            }
            if no_save_uploads {
                config.upload_dir = None;
            }
            if let Some(origin) = frontend_url {
                config.frontend_url = Some(origin);
            }
            if let Some(path) = threshold_file {
                config.threshold_file = Some(path);
            }
            if let Some(bytes) = max_upload_bytes {
                config.max_upload_bytes = bytes;
            }

            cmd_serve(config)?;
        }

        Commands::Predict {
            input,
            model,
            threshold_file,
            json,
        } => {
            cmd_predict(&input, &model, threshold_file.as_deref(), json)?;
        }

        Commands::Evaluate {
            data_dir,
            model,
            threshold_file,
            output,
        } => {
            cmd_evaluate(&data_dir, &model, threshold_file.as_deref(), output.as_deref())?;
        }

        Commands::InitModel { output } => {
            cmd_init_model(&output)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 +--------------------------------------------------+
 |   Pneumoscan                                     |
 |   Chest X-ray Pneumonia Detection (Burn + Rust)  |
 +--------------------------------------------------+
  "#
        .green()
    );
}

fn load_predictor(model: &Path, threshold_file: Option<&Path>) -> Result<Predictor> {
    let threshold = match threshold_file {
        Some(path) => Threshold::from_file(path)
            .with_context(|| format!("Failed to read threshold from {}", path.display()))?,
        None => Threshold::default(),
    };

    let predictor = Predictor::from_weights(model)
        .with_context(|| format!("Failed to load model from {}", model.display()))?;
    Ok(predictor.with_threshold(threshold))
}

fn cmd_serve(config: ServiceConfig) -> Result<()> {
    print_banner();
    println!("{}", "Service Configuration:".cyan().bold());
    println!("  Address:   http://{}", config.bind_address());
    println!("  Model:     {}", config.model_path.display());
    println!("  Store:     {}", config.store);
    println!("  Backend:   {}", backend_name());
    println!();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_server(config))
}

#[derive(Serialize)]
struct FilePrediction<'a> {
    file: &'a Path,
    prediction: String,
    confidence: f64,
    score: f32,
    inference_time_ms: f64,
}

fn cmd_predict(input: &Path, model: &Path, threshold_file: Option<&Path>, json: bool) -> Result<()> {
    info!("Running inference");
    info!("  Input: {}", input.display());
    info!("  Model: {}", model.display());

    if !input.exists() {
        anyhow::bail!("Input path not found: {}", input.display());
    }

    let files: Vec<PathBuf> = if input.is_dir() {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(input)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(is_allowed_extension)
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    } else {
        vec![input.to_path_buf()]
    };

    let predictor = load_predictor(model, threshold_file)?;

    if !json {
        println!("{}", "Inference Configuration:".cyan().bold());
        println!("  Input:     {}", input.display());
        println!("  Model:     {}", model.display());
        println!("  Backend:   {}", backend_name());
        println!("  Threshold: {}", predictor.threshold());
        println!();
    }

    let mut failures = 0usize;
    for file in &files {
        match predictor.predict_file(file) {
            Ok(prediction) => {
                if json {
                    let line = FilePrediction {
                        file,
                        prediction: prediction.label.to_string(),
                        confidence: prediction.confidence_percent(),
                        score: prediction.score,
                        inference_time_ms: prediction.inference_time_ms,
                    };
                    println!("{}", serde_json::to_string(&line)?);
                } else {
                    let label = if prediction.label.is_positive() {
                        prediction.label.to_string().red().bold()
                    } else {
                        prediction.label.to_string().green().bold()
                    };
                    println!("{}", file.display());
                    println!("  Prediction: {}", label);
                    println!("  Confidence: {:.2}%", prediction.confidence_percent());
                    println!("  Time: {:.2}ms", prediction.inference_time_ms);
                    println!();
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", "Error:".red(), file.display(), e);
            }
        }
    }

    if failures > 0 && failures == files.len() {
        anyhow::bail!("All {} images failed", failures);
    }
    Ok(())
}

fn cmd_evaluate(
    data_dir: &Path,
    model: &Path,
    threshold_file: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    print_banner();
    let predictor = load_predictor(model, threshold_file)?;

    println!("{}", "Evaluation Configuration:".cyan().bold());
    println!("  Data:      {}", data_dir.display());
    println!("  Model:     {}", model.display());
    println!("  Backend:   {}", backend_name());
    println!("  Threshold: {}", predictor.threshold());
    println!();

    let report = evaluate_directory(&predictor, data_dir, true)?;

    println!("{}", "Results:".cyan().bold());
    println!("  Images evaluated: {}", report.metrics.total_samples);
    println!("{}", report.metrics.display());
    println!("{}", report.metrics.confusion_matrix.display());
    let elapsed = Duration::from_secs_f64(report.total_time_secs);
    println!(
        "  Time: {} ({:.1} images/s)",
        format_elapsed(elapsed),
        images_per_second(report.metrics.total_samples + report.failures.len(), elapsed)
    );
    if !report.failures.is_empty() {
        println!(
            "  {} {} images could not be processed",
            "Warning:".yellow(),
            report.failures.len()
        );
    }

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("  Report written to {}", path.display());
    }

    Ok(())
}

fn cmd_init_model(output: &Path) -> Result<()> {
    let device = default_device();
    let config = XrayClassifierConfig::serving();
    let model: XrayClassifier<DefaultBackend> = XrayClassifier::new(&config, &device);
    model.save(output)?;

    println!(
        "{} Wrote untrained weights to {}",
        "Done:".green().bold(),
        output.display()
    );
    println!(
        "  {}",
        "Predictions from these weights are meaningless; use them only to exercise the service.".yellow()
    );
    Ok(())
}
