use clap::{Parser, Subcommand};
use cli::AnalysisJob;
use color_eyre::eyre::Result;
use morphometry::{
    AnalysisConfig, AnalysisPipeline, AnalysisRun, CancellationToken, DescriptorRange, RangeFilter, StatisticsTable,
    write_particles_csv, write_statistics_csv,
};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure the particles of one detection batch and write all exports
    Analyze {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        config: PathBuf,
        /// Detection file, overrides the job file
        #[arg(short, long)]
        detections: Option<String>,
        /// Analyzed image, overrides the job file
        #[arg(short, long)]
        image: Option<String>,
        /// Output directory, overrides the job file
        #[arg(short, long)]
        output_dir: Option<String>,
    },
    /// Re-filter a saved run and print its statistics table
    Summarize {
        /// Path to a run.json written by `analyze`
        #[arg(short, long)]
        run: PathBuf,
        /// Descriptor range such as `area=10:50`, repeatable
        #[arg(long = "range")]
        ranges: Vec<DescriptorRange>,
        /// Histogram bins for the histograms export
        #[arg(long)]
        bins: Option<usize>,
        /// Particle ids to remove before summarizing
        #[arg(long, num_args = 1..)]
        exclude: Vec<usize>,
        /// Write histograms of the filtered particles to this JSON file
        #[arg(long)]
        histograms: Option<PathBuf>,
    },
    /// Print the JSON schema of the analysis settings
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            config,
            detections,
            image,
            output_dir,
        } => {
            let mut job = AnalysisJob::from_file(&config)?;
            if detections.is_some() {
                job.detections = detections;
            }
            if image.is_some() {
                job.image = image;
            }
            if let Some(output_dir) = output_dir {
                job.output_dir = output_dir;
            }
            analyze(&job)?;
        }
        Commands::Summarize {
            run,
            ranges,
            bins,
            exclude,
            histograms,
        } => {
            summarize(&run, ranges, bins, exclude, histograms.as_deref())?;
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(AnalysisConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn analyze(job: &AnalysisJob) -> Result<()> {
    let batch = job.load_batch()?;
    info!("Loaded {} detections", batch.objects.len());

    let pipeline = AnalysisPipeline::builder()
        .with_config(job.analysis.clone())
        .build()?;
    info!("{}", pipeline.info());

    let run = pipeline.run(&batch, &CancellationToken::new())?;
    if run.particles.is_empty() {
        warn!("No particles found, writing empty exports");
    }

    let output_dir = Path::new(&job.output_dir);
    fs::create_dir_all(output_dir)?;

    write_particles_csv(File::create(output_dir.join("particles.csv"))?, &run, None)?;
    let table = run.statistics(None);
    write_statistics_csv(
        File::create(output_dir.join("statistics.csv"))?,
        &table,
        run.config.round_precision,
    )?;
    run.save_geojson(output_dir.join("particles.geojson"))?;
    run.save_json(output_dir.join("run.json"))?;
    write_json(&output_dir.join("histograms.json"), &run.histograms(None))?;
    write_json(&output_dir.join("orientation.json"), &run.orientation_field(None, true))?;

    print_table(&table, &run.config);
    info!("✅ Wrote {} particles to {}", run.particles.len(), output_dir.display());
    Ok(())
}

fn summarize(
    run_path: &Path,
    ranges: Vec<DescriptorRange>,
    bins: Option<usize>,
    mut exclude: Vec<usize>,
    histograms: Option<&Path>,
) -> Result<()> {
    let mut run = AnalysisRun::load_json(run_path)?;
    if let Some(bins) = bins {
        run.config.bin_count = bins;
        run.config.validate()?;
    }

    // Ids shift after each removal, so drop the highest first
    exclude.sort_unstable();
    exclude.dedup();
    for id in exclude.into_iter().rev() {
        run.remove_particle(id)?;
        info!("Removed particle {}", id);
    }

    let filter = RangeFilter::new(ranges);
    let view = run.particles.filter(&filter);
    info!("{} of {} particles match", view.len(), run.particles.len());

    let table = run.statistics(Some(&filter));
    print_table(&table, &run.config);

    if let Some(path) = histograms {
        write_json(path, &run.histograms(Some(&filter)))?;
        info!("Histograms written to {}", path.display());
    }
    Ok(())
}

fn print_table(table: &StatisticsTable, config: &AnalysisConfig) {
    let cell = |value: Option<f64>| match value {
        Some(v) => format!("{:.*}", config.round_precision as usize, v),
        None => "-".to_string(),
    };

    println!(
        "{:<14} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "descriptor", "count", "mean", "median", "max", "min", "std_dev"
    );
    for row in &table.rows {
        println!(
            "{:<14} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12}",
            row.label,
            row.count,
            cell(row.mean),
            cell(row.median),
            cell(row.max),
            cell(row.min),
            cell(row.std_dev)
        );
    }
}
