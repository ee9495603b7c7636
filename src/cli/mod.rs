//! Resale price CLI
//!
//! Experiment driver: train, evaluate and predict with saved models.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::listing::{clean_text_columns, TARGET_COLUMN};
use crate::model::{Model, ModelConfig};
use crate::training::{EstimatorKind, EvaluationMetrics};
use crate::utils::data_loader::{load_data, save_csv, split_target};

/// Column written by `predict`
pub const PREDICTION_COLUMN: &str = "predicted_price";

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn print_metrics(label: &str, metrics: &EvaluationMetrics) {
    println!(
        "  {:<10} {} {}   {} {}",
        muted(label),
        muted("RMSLE"),
        format!("{:.3}", metrics.rmsle).white().bold(),
        muted("WAPE"),
        format!("{:.2}%", metrics.wape).white().bold(),
    );
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "resale-price")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resale price models for secondhand fashion listings")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit a model on a listing export
    Train {
        /// Training data (CSV or Parquet) with a sold_price column
        #[arg(long)]
        train: PathBuf,

        /// Held-out data scored after training
        #[arg(long)]
        eval: Option<PathBuf>,

        /// JSON model config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Estimator registry key (see `estimators`)
        #[arg(short, long)]
        estimator: Option<String>,

        /// Model name, used as the artifact file name
        #[arg(short, long)]
        name: Option<String>,

        /// Enable text features
        #[arg(long)]
        text: bool,

        /// Disable tabular features
        #[arg(long)]
        no_tabular: bool,

        /// Normalise text columns before fitting
        #[arg(long)]
        clean_text: bool,

        /// Directory for the saved artifact
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Score a saved model on labelled data
    Evaluate {
        /// Saved model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Data with a sold_price column
        #[arg(short, long)]
        data: PathBuf,

        /// Normalise text columns before scoring
        #[arg(long)]
        clean_text: bool,
    },

    /// Predict prices with a saved model
    Predict {
        /// Saved model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Listings to price
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV; prints a preview when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Normalise text columns before predicting
        #[arg(long)]
        clean_text: bool,
    },

    /// List registered estimators
    Estimators,
}

/// Parameters of the `train` command
#[derive(Debug, Clone, Default)]
pub struct TrainArgs {
    pub train: PathBuf,
    pub eval: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub estimator: Option<String>,
    pub name: Option<String>,
    pub text: bool,
    pub no_tabular: bool,
    pub clean_text: bool,
    pub output_dir: Option<PathBuf>,
}

impl Commands {
    pub fn run(self) -> anyhow::Result<()> {
        match self {
            Commands::Train {
                train,
                eval,
                config,
                estimator,
                name,
                text,
                no_tabular,
                clean_text,
                output_dir,
            } => cmd_train(&TrainArgs {
                train,
                eval,
                config,
                estimator,
                name,
                text,
                no_tabular,
                clean_text,
                output_dir,
            }),
            Commands::Evaluate { model, data, clean_text } => cmd_evaluate(&model, &data, clean_text),
            Commands::Predict { model, data, output, clean_text } => {
                cmd_predict(&model, &data, output.as_deref(), clean_text)
            }
            Commands::Estimators => cmd_estimators(),
        }
    }
}

// ─── Config and data ───────────────────────────────────────────────────────────

/// Layer command-line overrides on top of the optional config file
pub fn resolve_config(args: &TrainArgs) -> anyhow::Result<ModelConfig> {
    let mut config = match &args.config {
        Some(path) => ModelConfig::from_file(path)?,
        None => ModelConfig::default(),
    };
    if let Some(key) = &args.estimator {
        config = config.with_estimator_name(key)?;
        if args.name.is_none() {
            config.model_name = key.clone();
        }
    }
    if let Some(name) = &args.name {
        config.model_name = name.clone();
    }
    if args.text {
        config.use_text_features = true;
    }
    if args.no_tabular {
        config.use_tab_features = false;
    }
    config.validate()?;
    Ok(config)
}

fn load_frame(path: &Path, clean_text: bool, text_cols: &[String]) -> anyhow::Result<DataFrame> {
    step_run(&format!("Loading {}", path.display()));
    let start = Instant::now();
    let mut df = load_data(path)?;
    if clean_text {
        let present: Vec<String> = text_cols
            .iter()
            .filter(|c| df.get_column_index(c).is_some())
            .cloned()
            .collect();
        df = clean_text_columns(&df, &present)?;
    }
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

fn labelled_frame(
    path: &Path,
    clean_text: bool,
    text_cols: &[String],
) -> anyhow::Result<(DataFrame, Vec<f64>)> {
    let df = load_frame(path, clean_text, text_cols)?;
    let (features, y) = split_target(&df, TARGET_COLUMN)?;
    Ok((features, y.to_vec()))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = resolve_config(args)?;
    let text_cols = config.extractor_params.text_cols.clone();
    let (train_df, y_train) = labelled_frame(&args.train, args.clean_text, &text_cols)?;
    let eval = match &args.eval {
        Some(path) => Some(labelled_frame(path, args.clean_text, &text_cols)?),
        None => None,
    };

    step_run(&format!("Fitting {}", config.estimator.kind().as_str().cyan()));
    let start = Instant::now();
    let transform = config.target_transform;
    let mut model = Model::new(config)?;
    model.fit(&train_df, &transform.forward_all(&y_train))?;
    step_done(&format!("{:?}", start.elapsed()));

    let train_metrics = model.evaluate(&train_df, &y_train)?;
    let eval_metrics = match &eval {
        Some((df, y)) => Some(model.evaluate(df, y)?),
        None => None,
    };

    println!();
    print_metrics("train", &train_metrics);
    if let Some(m) = &eval_metrics {
        print_metrics("eval", m);
    }

    if let Some(dir) = &args.output_dir {
        let metrics = eval_metrics.unwrap_or(train_metrics);
        let path = model.save(dir, metrics.to_map())?;
        println!();
        line_box_top();
        line_box(&kv("Model    ", model.model_name()));
        line_box(&kv("Features ", &model.n_features().unwrap_or(0).to_string()));
        line_box(&kv("Saved to ", &path.display().to_string()));
        line_box_bottom();
    }

    println!();
    Ok(())
}

pub fn cmd_evaluate(model_path: &Path, data_path: &Path, clean_text: bool) -> anyhow::Result<()> {
    section("Evaluate");

    let (model, metadata) = Model::load(model_path)?;
    println!("  {:<12} {} {}", muted("Model"), metadata.model_name.white(), dim(&metadata.saved_at));

    let (df, y) = labelled_frame(data_path, clean_text, &model.config().extractor_params.text_cols)?;
    let metrics = model.evaluate(&df, &y)?;

    println!();
    print_metrics("data", &metrics);
    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
    clean_text: bool,
) -> anyhow::Result<()> {
    section("Predict");

    let (model, metadata) = Model::load(model_path)?;
    println!("  {:<12} {}", muted("Model"), metadata.model_name.white());

    let mut df = load_frame(data_path, clean_text, &model.config().extractor_params.text_cols)?;

    step_run("Predicting");
    let start = Instant::now();
    let predictions = model.predict(&df)?;
    step_done(&format!("{} rows in {:?}", predictions.len(), start.elapsed()));

    df.with_column(Series::new(PREDICTION_COLUMN.into(), predictions.to_vec()))?;

    match output {
        Some(path) => {
            save_csv(&mut df, path)?;
            println!("  {} {}", ok("✓"), format!("Wrote {}", path.display()));
        }
        None => {
            println!();
            println!("{}", df.head(Some(10)));
        }
    }
    println!();
    Ok(())
}

pub fn cmd_estimators() -> anyhow::Result<()> {
    section("Estimators");
    for kind in EstimatorKind::ALL {
        println!("  {:<12} {}", kind.as_str().white(), muted(kind.description()));
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::EstimatorConfig;

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "resale-price", "train", "--train", "train.csv", "--estimator", "knn", "--text",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { estimator, text, no_tabular, .. } => {
                assert_eq!(estimator.as_deref(), Some("knn"));
                assert!(text);
                assert!(!no_tabular);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_resolve_config_overrides() {
        let args = TrainArgs {
            estimator: Some("lasso".to_string()),
            text: true,
            ..Default::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.model_name, "lasso");
        assert!(matches!(config.estimator, EstimatorConfig::Lasso(_)));
        assert!(config.use_text_features);

        let bad = TrainArgs {
            estimator: Some("svr".to_string()),
            ..Default::default()
        };
        assert!(resolve_config(&bad).is_err());

        let empty = TrainArgs {
            no_tabular: true,
            ..Default::default()
        };
        assert!(resolve_config(&empty).is_err());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }
}
