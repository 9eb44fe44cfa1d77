//! Command-line entry point: train, predict, explain and demo.
//!
//! Usage:
//!   maize-yield train --config configs/train.json
//!   maize-yield predict --features '{"vegetation_index": 0.62, ...}'
//!   maize-yield explain --features-file plot.json --report forecast.csv
//!   maize-yield demo --output models/demo.forest

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use maize_yield::explainability::ImportanceType;
use maize_yield::report::DEFAULT_DRIVER_THRESHOLD;
use maize_yield::{
    FeatureVector, ForecastReport, ModelHandle, PipelineConfig, RiskTier, TrainingPipeline,
    YieldModel,
};

#[derive(Parser)]
#[command(name = "maize-yield")]
#[command(about = "Explainable maize yield estimation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a forest and write the artifact
    Train {
        /// JSON pipeline config; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Training CSV (overrides the config)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Artifact destination (overrides the config)
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        n_trees: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        /// Training threads, 0 = all cores
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Predict yield for one plot
    Predict(InferenceArgs),
    /// Predict and attribute the prediction to each feature
    Explain {
        #[command(flatten)]
        inference: InferenceArgs,
        /// Export a forecast report (risk tier and key drivers) as CSV here
        /// and print it instead of the raw attribution
        #[arg(long, value_name = "CSV")]
        report: Option<PathBuf>,
        /// Timestamp written into the report
        #[arg(long, default_value = "unspecified")]
        date: String,
        /// Minimum |contribution| for a key driver, t/ha
        #[arg(long, default_value_t = DEFAULT_DRIVER_THRESHOLD)]
        threshold: f64,
    },
    /// Inspect or export the built-in demo model
    Demo {
        /// Write the demo artifact here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InferenceArgs {
    /// Model artifact
    #[arg(long, default_value = "models/maize_yield.forest")]
    model: PathBuf,
    /// Use the demo model when the artifact does not exist
    #[arg(long)]
    allow_demo: bool,
    /// Feature values as a JSON object
    #[arg(long, conflicts_with = "features_file")]
    features: Option<String>,
    /// File containing the JSON feature object
    #[arg(long)]
    features_file: Option<PathBuf>,
}

impl InferenceArgs {
    fn handle(&self) -> Result<ModelHandle> {
        let handle = if self.allow_demo {
            ModelHandle::load_or_demo(&self.model)
        } else {
            ModelHandle::load(&self.model)
        };
        handle.with_context(|| format!("loading {}", self.model.display()))
    }

    fn feature_vector(&self) -> Result<FeatureVector> {
        let text = match (&self.features, &self.features_file) {
            (Some(inline), _) => inline.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
            (None, None) => bail!("pass --features or --features-file"),
        };
        let fields: HashMap<String, f64> =
            serde_json::from_str(&text).context("features must be a JSON object of numbers")?;
        Ok(FeatureVector::try_from(fields)?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { config, data, model, n_trees, seed, threads } => {
            let mut config = match config {
                Some(path) => PipelineConfig::from_json_file(&path)?,
                None => PipelineConfig::default(),
            };
            if let Some(data) = data {
                config.data_path = data;
            }
            if let Some(model) = model {
                config.model_path = model;
            }
            if let Some(n_trees) = n_trees {
                config.forest.n_trees = n_trees;
            }
            if let Some(seed) = seed {
                config.forest.seed = seed;
            }
            if let Some(threads) = threads {
                config.forest.n_threads = threads;
            }

            let outcome = TrainingPipeline::new(config).run()?;
            let evaluation = match &outcome.evaluation {
                Ok(report) => serde_json::to_value(report)?,
                Err(e) => json!({ "error": e.to_string() }),
            };
            print_json(&json!({
                "model_path": outcome.model_path,
                "n_train": outcome.n_train,
                "n_test": outcome.n_test,
                "evaluation": evaluation,
            }))?;
        }
        Commands::Predict(args) => {
            let handle = args.handle()?;
            let features = args.feature_vector()?;
            let prediction = handle.predict(&features);
            print_json(&json!({
                "prediction": prediction,
                "risk": RiskTier::from_yield(prediction),
                "authoritative": handle.is_authoritative(),
            }))?;
        }
        Commands::Explain { inference, report, date, threshold } => {
            let handle = inference.handle()?;
            let features = inference.feature_vector()?;
            let attribution = handle.explain(&features);
            if let Some(path) = report {
                let forecast = ForecastReport::new(date, &attribution, threshold);
                forecast.export_csv(&path)?;
                print_json(&forecast)?;
            } else {
                print_json(&json!({
                    "attribution": attribution,
                    "authoritative": handle.is_authoritative(),
                }))?;
            }
        }
        Commands::Demo { output } => {
            let model = YieldModel::demo();
            match output {
                Some(path) => {
                    model.persist(&path)?;
                    println!("demo model written to {}", path.display());
                }
                None => {
                    let importance = model.feature_importance(ImportanceType::Gain);
                    print_json(&json!({
                        "n_trees": model.forest().n_trees(),
                        "baseline": model.baseline(),
                        "top_features": importance.top_k(3),
                    }))?;
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
