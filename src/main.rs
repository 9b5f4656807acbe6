use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;

use fare_predictor::{
    config::TrainConfig,
    model::{FarePredictor, DEFAULT_META_PATH, DEFAULT_MODEL_PATH},
    server::{self, AppState},
    train,
};

/// Tunisian taxi fare predictor
#[derive(Parser, Debug)]
#[command(name = "fare_predictor", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate synthetic rides, fit the model and save it
    Train(TrainArgs),
    /// Predict one fare and print it as JSON
    Predict(PredictArgs),
    /// Serve predictions over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ModelPaths {
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    #[arg(long, env = "META_PATH", default_value = DEFAULT_META_PATH)]
    meta_path: PathBuf,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// JSON training config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    samples: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, env = "MODEL_PATH")]
    model_path: Option<PathBuf>,

    #[arg(long, env = "META_PATH")]
    meta_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Trip distance in kilometers
    #[arg(allow_hyphen_values = true)]
    distance_km: String,

    /// Trip duration in minutes
    #[arg(allow_hyphen_values = true)]
    duration_min: String,

    #[arg(default_value = "Tunis")]
    city: String,

    /// morning, afternoon or night
    #[arg(default_value = "afternoon")]
    time_of_day: String,

    #[command(flatten)]
    paths: ModelPaths,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Number of predictions kept for /api/history
    #[arg(long, default_value_t = 1000)]
    history_capacity: usize,

    #[command(flatten)]
    paths: ModelPaths,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout is reserved for JSON results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Predict(args) => {
            init_tracing("warn");
            run_predict(args)
        }
        Commands::Train(args) => {
            init_tracing("info");
            report(run_train(args))
        }
        Commands::Serve(args) => {
            init_tracing("info");
            report(run_serve(args).await)
        }
    }
}

fn report(res: anyhow::Result<()>) -> ExitCode {
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

// ---------- predict ----------

fn run_predict(args: PredictArgs) -> ExitCode {
    match predict_json(&args) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", json!({ "error": format!("{e:#}") }));
            ExitCode::FAILURE
        }
    }
}

fn predict_json(args: &PredictArgs) -> anyhow::Result<String> {
    let distance_km: f64 = args
        .distance_km
        .trim()
        .parse()
        .with_context(|| format!("could not convert distance_km to float: '{}'", args.distance_km))?;
    let duration_min: f64 = args
        .duration_min
        .trim()
        .parse()
        .with_context(|| format!("could not convert duration_min to float: '{}'", args.duration_min))?;

    let predictor = FarePredictor::load(&args.paths.model_path, &args.paths.meta_path)?;
    let out = predictor.predict(distance_km, duration_min, &args.city, &args.time_of_day)?;
    Ok(serde_json::to_string(&out)?)
}

// ---------- train ----------

fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let mut cfg = match &args.config {
        Some(path) => TrainConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TrainConfig::default(),
    };
    if let Some(n) = args.samples {
        cfg.n_samples = n;
    }
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    if let Some(p) = args.model_path {
        cfg.model_path = p;
    }
    if let Some(p) = args.meta_path {
        cfg.meta_path = p;
    }

    let (_, report) = train::train(&cfg)?;
    tracing::info!(
        "training completed: {} train / {} test rows, MAE {:.2} DT, R2 {:.4}",
        report.n_train,
        report.n_test,
        report.mae,
        report.r2
    );
    Ok(())
}

// ---------- serve ----------

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let predictor = FarePredictor::load(&args.paths.model_path, &args.paths.meta_path)?;

    // Warmup to catch a broken model before accepting traffic
    let warm = predictor.predict_fare(1.0, 2.0, "Tunis", "afternoon")?;
    tracing::info!("warmup prediction ok ({warm} DT)");
    tracing::info!(
        "loaded model; feature_columns[{}]: {:?}",
        predictor.feature_info().width(),
        predictor.feature_info().feature_columns
    );

    let state = AppState::new(predictor, args.history_capacity);
    let app = server::router(state);
    let addr = format!("{}:{}", args.host, args.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
