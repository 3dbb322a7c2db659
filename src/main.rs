use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use svgscale::{ConverterConfig, DirectoryHost, Pipeline, RenderOutcome, ScaleFactor, SourceDocument};

/// Convert an SVG into a PNG at an integer scale factor
#[derive(Parser, Debug)]
#[command(name = "svgscale", version, about)]
struct Cli {
    /// SVG file to convert
    input: PathBuf,

    /// Scale factor: 1, 2, 4, 8, 16, 32 or 64 (a trailing `x` is accepted)
    #[arg(short, long, default_value = "1")]
    scale: ScaleFactor,

    /// Output directory (overrides the config file)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print original and scaled dimensions without exporting
    #[arg(long)]
    info: bool,

    /// Print the rendered PNG as a data URI
    #[arg(long)]
    preview: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => ConverterConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConverterConfig::default(),
    };
    if let Some(dir) = cli.out_dir {
        config.output_dir = dir;
    }
    config.validate()?;

    let pipeline = Pipeline::new(svgscale::engine::default_rasterizer(), &config);
    pipeline.ready().await.context("initializing rasterizer")?;

    let doc = SourceDocument::from_path(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let first = pipeline.upload(doc).await;
    if let RenderOutcome::Skipped(_) = first {
        bail!("{} has no explicit width/height", cli.input.display());
    }

    if cli.scale != pipeline.scale() {
        pipeline.set_scale(cli.scale).await;
    }

    if cli.info {
        let meta = pipeline.metadata();
        println!("Original  {}w x {}h", meta.width, meta.height);
        println!("Scaled    {} ({})", pipeline.scaled_size(), pipeline.scale());
        return Ok(());
    }

    let host = DirectoryHost::new(&config.output_dir);
    let path = pipeline
        .export(&host)
        .await?
        .context("nothing to export")?;

    if cli.preview {
        if let Some(uri) = pipeline.preview_data_uri() {
            println!("{}", uri);
        }
    }
    if let Some(raster) = pipeline.raster() {
        println!(
            "{} {} sha256:{}",
            path.display(),
            raster.size,
            svgscale::export::sha256_hex(&raster.bytes)
        );
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // One logical thread; renders run on the blocking pool.
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("svgscale: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("svgscale: {:#}", e);
        std::process::exit(1);
    }
}
