use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use quantools::{
    dataset::{Dataset, Manifest},
    format,
    metrics::compute_statistics,
    plot::{
        DEFAULT_SIZE, Scale,
        histograms::{Histogram2dOptions, HistogramOptions, plot_2d_histogram, plot_parameter},
        render_svg,
        slice::{LabelOverlayContainer, LabeledSliceDisplay},
        values::{
            GroupingOptions, ValuePlotOptions, plot_grouping, plot_parameter_single,
            plot_t1_single, plot_t2_single,
        },
    },
    segmentation::Parameter,
};

#[derive(Parser)]
#[command(name = "quantools", version)]
#[command(about = "Statistics and plots of quantitative MRI parameter maps")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show format, shape and value range of a volume
    Info { path: PathBuf },
    /// Per-tissue statistics of every parameter
    Stats {
        manifest: PathBuf,
        #[arg(long, value_enum, default_value_t = StatsFormat::Json)]
        format: StatsFormat,
        /// Output file; stdout if absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Overlaid per-tissue histograms of one parameter
    Histogram {
        manifest: PathBuf,
        #[arg(long, default_value = "T2")]
        parameter: Parameter,
        #[arg(long, default_value_t = 60)]
        bins: usize,
        /// Logarithmic count axis
        #[arg(long)]
        log: bool,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// 2D histogram of T1 against T2 for one tissue
    Hist2d {
        manifest: PathBuf,
        #[arg(long)]
        tissue: String,
        #[arg(long, default_value = "T1")]
        x: Parameter,
        #[arg(long, default_value = "T2")]
        y: Parameter,
        #[arg(long, default_value_t = 100)]
        bins: usize,
        #[arg(long, default_value_t = 0.3)]
        gamma: f64,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Mean and standard deviation of one parameter per tissue
    Values {
        manifest: PathBuf,
        #[arg(long, default_value = "T1")]
        parameter: Parameter,
        #[arg(long, num_args = 2, value_names = ["LO", "HI"])]
        ylim: Option<Vec<f64>>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Tissues placed in the T1/T2 plane
    Grouping {
        manifest: PathBuf,
        #[arg(long, default_value = "T1")]
        x: Parameter,
        #[arg(long, default_value = "T2")]
        y: Parameter,
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long, default_value = "")]
        postfix: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// One plane of a parameter map with the masks drawn on top
    Slice {
        manifest: PathBuf,
        #[arg(long, default_value = "T1")]
        background: Parameter,
        #[arg(long, default_value_t = 0)]
        axis: usize,
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatsFormat {
    Json,
    Csv,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load(manifest: &Path) -> anyhow::Result<Dataset> {
    let manifest = Manifest::from_path(manifest)
        .with_context(|| format!("reading manifest {}", manifest.display()))?;
    Ok(manifest.load()?)
}

fn info(path: &Path) -> anyhow::Result<()> {
    let format = format::resolve(path)
        .with_context(|| format!("unknown volume format: {}", path.display()))?;
    let volume = format::read_volume(path)?;
    println!("format: {}", format.name);
    println!("shape:  {:?}", volume.shape());
    match volume.min_max() {
        Some((lo, hi)) => println!("range:  {lo} .. {hi}"),
        None => println!("range:  (no values)"),
    }
    Ok(())
}

fn stats(manifest: &Path, format: StatsFormat, output: Option<&Path>) -> anyhow::Result<()> {
    let report = compute_statistics(&load(manifest)?.segmentation()?)?;
    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    match format {
        StatsFormat::Json => writeln!(out, "{}", report.to_json()?)?,
        StatsFormat::Csv => report.write_csv(&mut out)?,
    }
    Ok(())
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Info { path } => info(&path),
        Command::Stats {
            manifest,
            format,
            output,
        } => stats(&manifest, format, output.as_deref()),
        Command::Histogram {
            manifest,
            parameter,
            bins,
            log,
            title,
            output,
        } => {
            let segmentation = load(&manifest)?.segmentation()?;
            let options = HistogramOptions {
                parameter,
                bins,
                yscale: if log { Scale::Log } else { Scale::Linear },
                title,
                ..Default::default()
            };
            render_svg(&output, DEFAULT_SIZE, |area| {
                plot_parameter(area, &segmentation, &options)
            })?;
            Ok(())
        }
        Command::Hist2d {
            manifest,
            tissue,
            x,
            y,
            bins,
            gamma,
            title,
            output,
        } => {
            let segmentation = load(&manifest)?.segmentation()?;
            let roi = segmentation
                .by_name(&tissue)
                .with_context(|| format!("no tissue named '{tissue}'"))?;
            let options = Histogram2dOptions {
                x,
                y,
                bins,
                gamma,
                title,
                ..Default::default()
            };
            render_svg(&output, DEFAULT_SIZE, |area| {
                plot_2d_histogram(area, roi, &options)
            })?;
            Ok(())
        }
        Command::Values {
            manifest,
            parameter,
            ylim,
            output,
        } => {
            let dataset = load(&manifest)?;
            let report = compute_statistics(&dataset.segmentation()?)?;
            let ylim = match ylim.as_deref() {
                None => None,
                Some(&[lo, hi]) => Some((lo, hi)),
                Some(other) => bail!("--ylim takes two values, got {}", other.len()),
            };
            let options = ValuePlotOptions {
                unit: dataset.unit,
                ylim,
                ..Default::default()
            };
            render_svg(&output, DEFAULT_SIZE, |area| match parameter {
                Parameter::T1 => plot_t1_single(area, &report, &options),
                Parameter::T2 => plot_t2_single(area, &report, &options),
                other => plot_parameter_single(area, &report, other, &options),
            })?;
            Ok(())
        }
        Command::Grouping {
            manifest,
            x,
            y,
            prefix,
            postfix,
            output,
        } => {
            let dataset = load(&manifest)?;
            let report = compute_statistics(&dataset.segmentation()?)?;
            let options = GroupingOptions {
                x,
                y,
                unit: dataset.unit,
                prefix,
                postfix,
                ..Default::default()
            };
            render_svg(&output, DEFAULT_SIZE, |area| {
                plot_grouping(area, &report, &options)
            })?;
            Ok(())
        }
        Command::Slice {
            manifest,
            background,
            axis,
            index,
            output,
        } => {
            let dataset = load(&manifest)?;
            let overlays = dataset
                .masks
                .iter()
                .map(|(name, mask)| (name.clone(), mask.map(|&b| f64::from(u8::from(b)))));
            let labels = LabelOverlayContainer::from_labels(overlays, None, None)?;
            let mut display =
                LabeledSliceDisplay::new(dataset.maps.get(background).clone(), labels)?;
            display.set_axis(axis)?;
            display.set_index(index)?;
            render_svg(&output, DEFAULT_SIZE, |area| display.render(area))?;
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli.command)
}
