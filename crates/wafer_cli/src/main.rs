//! Wafer CLI
//!
//! Simulate wafers, dump training corpora, train and classify from a shell.
//! Log verbosity follows `RUST_LOG` (default `info`).

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use wafer_core::classifier::{EpochControl, ModelState, Trainer};
#[cfg(feature = "cli")]
use wafer_core::corpus::TrainingCorpusGenerator;
#[cfg(feature = "cli")]
use wafer_core::features::extract;
#[cfg(feature = "cli")]
use wafer_core::prediction::{AutoTrain, PredictionService};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "wafer")]
#[command(about = "Simulate wafer defect patterns and classify them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Simulate one wafer and print its map
    Simulate {
        /// Wafer diameter in mm (200, 300 or 450)
        #[arg(long, default_value_t = 300.0)]
        diameter: f64,

        /// Die area in mm²
        #[arg(long, default_value_t = 100.0)]
        die_size: f64,

        /// Pattern label, e.g. "Edge Die Failure"
        #[arg(long)]
        pattern: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Print the feature vector and tier counts as JSON instead
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Generate a training corpus
    Corpus {
        /// Total samples, split evenly over the 21 classes
        #[arg(long, default_value_t = 2_100)]
        samples: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Generate classes on the rayon pool
        #[arg(long, default_value = "false")]
        parallel: bool,

        /// Output JSON file path
        #[arg(long)]
        out: Option<PathBuf>,

        /// Save corpus metadata JSON to this path (requires --out)
        #[arg(long, requires = "out")]
        metadata: Option<PathBuf>,
    },

    /// Train the classifier and report accuracy
    Train {
        #[arg(long, default_value_t = 2_100)]
        samples: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Epoch cap
        #[arg(long)]
        epochs: Option<usize>,

        /// Train on a corpus file written by `corpus --out`
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Train, simulate one wafer and classify it
    Classify {
        #[arg(long, default_value_t = 300.0)]
        diameter: f64,

        #[arg(long, default_value_t = 100.0)]
        die_size: f64,

        #[arg(long)]
        pattern: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Training corpus size
        #[arg(long, default_value_t = 2_100)]
        samples: usize,

        #[arg(long)]
        epochs: Option<usize>,

        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
}

#[cfg(feature = "cli")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { diameter, die_size, pattern, seed, json } => {
            let config = wafer_cli::pipeline_config(0, seed, None);
            let grid = wafer_cli::simulate(&config, diameter, die_size, &pattern, seed)?;

            if json {
                let out = serde_json::json!({
                    "pattern": grid.selector.map(|s| s.to_string()),
                    "tiers": grid.tier_counts(),
                    "features": extract(&grid),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Wafer {diameter} mm, die {die_size} mm², seed {seed}");
                if let Some(selector) = grid.selector {
                    println!("   Field: {selector}");
                }
                print!("{}", wafer_cli::render_wafer(&grid));
            }
        }

        Commands::Corpus { samples, seed, parallel, out, metadata } => {
            let config = wafer_cli::pipeline_config(samples, seed, None);
            let generator = TrainingCorpusGenerator::from_pipeline(&config)?;
            let corpus = if parallel {
                generator.generate_parallel(seed)?
            } else {
                generator.generate(seed)?
            };
            println!("Generated {} samples ({} per class)", corpus.len(), generator.samples_per_class());

            if let Some(path) = out {
                let meta = wafer_cli::write_corpus(&corpus, &path)?;
                println!("   Output:  {}", path.display());
                println!("   Size:    {:.2} KB", meta.size_bytes as f64 / 1024.0);
                println!("   Created: {}", meta.created_at);

                if let Some(metadata_path) = metadata {
                    wafer_cli::save_metadata(&metadata_path, &meta)?;
                    println!("   Metadata: {}", metadata_path.display());
                }
            }
        }

        Commands::Train { samples, seed, epochs, corpus } => {
            let config = wafer_cli::pipeline_config(samples, seed, epochs);
            let corpus = match corpus {
                Some(path) => wafer_cli::load_corpus(&path)?,
                None => TrainingCorpusGenerator::from_pipeline(&config)?.generate(seed)?,
            };

            let trainer = Trainer::new(config.trainer.clone())?;
            let model = trainer
                .train_with_observer(&corpus, |epoch| {
                    println!(
                        "   epoch {:>3}  loss {:.4}  train {:.3}  val {:.3}",
                        epoch.epoch, epoch.train_loss, epoch.train_accuracy, epoch.val_accuracy
                    );
                    EpochControl::Continue
                })
                .context("Training failed")?;

            let report = model.report();
            println!("Trained for {} epochs", report.epochs_run);
            println!("   Final loss:          {:.4}", report.final_loss);
            println!("   Train accuracy:      {:.3}", report.train_accuracy);
            println!("   Validation accuracy: {:.3}", report.val_accuracy);
            if report.early_stopped {
                println!("   Stopped early");
            }
        }

        Commands::Classify { diameter, die_size, pattern, seed, samples, epochs, top_k } => {
            let config = wafer_cli::pipeline_config(samples, seed, epochs);
            let grid = wafer_cli::simulate(&config, diameter, die_size, &pattern, seed)?;

            let service = PredictionService::new(config).with_auto_train(AutoTrain::Enabled).with_top_k(top_k);
            let mut state = ModelState::default();
            let result = service.predict(&mut state, &extract(&grid)).context("Classification failed")?;

            println!("Simulated: {pattern}");
            println!("Predicted: {} ({:.1}%)", result.label, result.confidence * 100.0);
            print!("{}", wafer_cli::render_prediction(&result));
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("wafer CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
