use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use medlabel::config::{AppConfig, ModelConfig, RecognizerKind};
use medlabel::detection::tesseract::DEFAULT_TESSERACT_TIMEOUT_SECS;
use medlabel::detection::{ContourRegionDetector, RegionDetector, TesseractRecognizer, TextRecognizer};
use medlabel::labels::openfda::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use medlabel::labels::{DrugLabelSource, LabelSourceConfig, NoLabelSource, OpenFdaClient};
use medlabel::{BrandPipeline, PipelineOutcome};

#[derive(Parser)]
#[command(name = "medlabel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Read the brand name on a medication package photo and look up its drug label")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save debug images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Skip the label lookup (brand recognition only)
    #[arg(long)]
    skip_lookup: bool,

    /// Text recognizer used on the brand region
    #[arg(long, value_enum, default_value_t = RecognizerKind::Ocrs)]
    recognizer: RecognizerKind,

    /// Directory holding text-detection.rten and text-recognition.rten
    #[arg(long, value_name = "DIR", env = "MEDLABEL_MODELS_DIR")]
    models_dir: Option<PathBuf>,

    /// Base URL of the openFDA API
    #[arg(long, env = "MEDLABEL_LABEL_URL", default_value = DEFAULT_BASE_URL)]
    label_url: String,

    /// Label lookup timeout in seconds
    #[arg(long, env = "MEDLABEL_LOOKUP_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    lookup_timeout: u64,

    /// Path to the tesseract binary (with --recognizer tesseract)
    #[arg(long, default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// Tesseract language
    #[arg(long, default_value = "eng")]
    tesseract_lang: String,

    /// Seconds a tesseract run may take before it is killed
    #[arg(long, default_value_t = DEFAULT_TESSERACT_TIMEOUT_SECS)]
    tesseract_timeout: u64,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

impl Cli {
    fn to_config(&self) -> anyhow::Result<AppConfig> {
        let models_dir = match &self.models_dir {
            Some(dir) => dir.clone(),
            None => ModelConfig::default_models_dir()?,
        };

        Ok(AppConfig {
            models: ModelConfig { models_dir },
            labels: LabelSourceConfig {
                base_url: self.label_url.clone(),
                timeout: Duration::from_secs(self.lookup_timeout),
                ..Default::default()
            },
            recognizer: self.recognizer,
            tesseract: TesseractRecognizer {
                binary: self.tesseract_bin.clone(),
                language: self.tesseract_lang.clone(),
                scratch_dir: None,
                timeout: Duration::from_secs(self.tesseract_timeout),
            },
            debug_dir: self.debug_out.clone(),
        })
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "medlabel=debug" } else { "medlabel=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run<S: DrugLabelSource + 'static>(
    config: &AppConfig,
    detector: Arc<dyn RegionDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    source: S,
    bytes: Vec<u8>,
) -> anyhow::Result<PipelineOutcome> {
    let mut pipeline = BrandPipeline::new(detector, recognizer, source);
    if let Some(dir) = &config.debug_dir {
        pipeline = pipeline.with_debug(dir.clone())?;
    }
    Ok(Arc::new(pipeline).run_blocking(bytes).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let config = args.to_config()?;

    // Models are loaded once, before any input is read
    let recognizer = config.build_recognizer()?;
    let detector: Arc<dyn RegionDetector> = Arc::new(ContourRegionDetector::default());

    info!(path = %args.image_path.display(), "loading image");
    let bytes = tokio::fs::read(&args.image_path)
        .await
        .with_context(|| format!("Failed to read image {}", args.image_path.display()))?;

    let outcome = if args.skip_lookup {
        run(&config, detector, recognizer, NoLabelSource, bytes).await?
    } else {
        let client = OpenFdaClient::new(&config.labels)?;
        run(&config, detector, recognizer, client, bytes).await?
    };
    info!(stage = ?outcome.stage, "done");

    let json = if args.pretty {
        serde_json::to_string_pretty(&outcome.result)?
    } else {
        serde_json::to_string(&outcome.result)?
    };
    println!("{}", json);

    Ok(())
}
