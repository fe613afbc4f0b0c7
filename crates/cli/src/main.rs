use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use facewatch_core::detection::infrastructure::onnx_yolo_detector::{
    OnnxYoloDetector, DEFAULT_SCORE_FLOOR,
};
use facewatch_core::hashing::infrastructure::perceptual_hasher::PerceptualHasher;
use facewatch_core::identity::domain::identity_store::IdentityStore;
use facewatch_core::identity::infrastructure::directory_importer::import_directory;
use facewatch_core::identity::infrastructure::json_identity_repository::JsonIdentityRepository;
use facewatch_core::pipeline::frame_pipeline::FramePipeline;
use facewatch_core::pipeline::infrastructure::json_lines_presenter::JsonLinesPresenter;
use facewatch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facewatch_core::pipeline::recognition_session::{RecognitionSession, SessionSummary};
use facewatch_core::shared::config::RecognitionConfig;
use facewatch_core::shared::constants::YOLO_MODEL_NAME;
use facewatch_core::video::domain::frame_source::FrameSource;
use facewatch_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facewatch_core::video::infrastructure::image_file_source::{is_image_file, ImageFileSource};

const APP_DIR: &str = "facewatch";

type CliError = Box<dyn std::error::Error + Send + Sync>;

/// Register people by face and recognise them in images, videos and live streams.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    /// Recognition settings (JSON, camelCase keys). Defaults apply to missing keys.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Identity store directory.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognise faces in an image, a video, or a live stream/device.
    Scan {
        /// Image file, video file, stream URL or capture device.
        input: PathBuf,

        /// Treat the input as a live source (stale frames are dropped).
        #[arg(long)]
        live: bool,

        /// YOLO face model (ONNX). Defaults to the store's models directory.
        #[arg(long)]
        model: Option<PathBuf>,

        /// Write JSON lines here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Omit frames without faces from the output.
        #[arg(long)]
        skip_empty: bool,
    },
    /// Register a person from a face image.
    Register { name: String, image: PathBuf },
    /// Replace the reference image of a registered person.
    Update { name: String, image: PathBuf },
    /// Remove a registered person.
    Delete { name: String },
    /// List registered persons.
    List,
    /// Register every image in a directory, naming people after the file names.
    Import { dir: PathBuf },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RecognitionConfig::load(path)?,
        None => RecognitionConfig::default(),
    };
    let store_dir = match cli.store {
        Some(dir) => dir,
        None => default_store_dir()?,
    };
    let store = open_store(&store_dir, &config)?;

    match cli.command {
        Command::Scan {
            input,
            live,
            model,
            output,
            skip_empty,
        } => {
            let model = model.unwrap_or_else(|| store_dir.join("models").join(YOLO_MODEL_NAME));
            run_scan(&input, live, &model, output.as_deref(), skip_empty, store, &config)
        }
        Command::Register { name, image } => {
            let face = load_image(&image)?;
            match store.register(&name, &face) {
                Ok(id) => {
                    println!("Registered {name} (id {id})");
                    Ok(())
                }
                Err(e) if e.is_already_exists() => Err(format!("Not registered: {e}").into()),
                Err(e) => Err(e.into()),
            }
        }
        Command::Update { name, image } => {
            let face = load_image(&image)?;
            if store.update_image(&name, &face)? {
                println!("Updated {name}");
                Ok(())
            } else {
                Err(format!("No registered person named {name:?}").into())
            }
        }
        Command::Delete { name } => {
            if store.delete_person(&name)? {
                println!("Deleted {name}");
                Ok(())
            } else {
                Err(format!("No registered person named {name:?}").into())
            }
        }
        Command::List => {
            let identities = store.list_all();
            if identities.is_empty() {
                println!("No registered persons");
            }
            for identity in identities {
                let image = identity
                    .image_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".into());
                println!("{:>4}  {:<24} {}", identity.id.0, identity.name, image);
            }
            Ok(())
        }
        Command::Import { dir } => {
            let report = import_directory(&store, &dir)?;
            println!("Registered {} persons", report.registered.len());
            for (name, reason) in &report.skipped {
                println!("  skipped {name}: {reason}");
            }
            for (path, reason) in &report.unreadable {
                println!("  unreadable {}: {reason}", path.display());
            }
            Ok(())
        }
    }
}

fn run_scan(
    input: &Path,
    live: bool,
    model: &Path,
    output: Option<&Path>,
    skip_empty: bool,
    store: IdentityStore,
    config: &RecognitionConfig,
) -> Result<(), CliError> {
    if !model.exists() {
        return Err(format!(
            "Face model not found: {} (pass --model or place {YOLO_MODEL_NAME} there)",
            model.display()
        )
        .into());
    }
    let source = open_source(input, live)?;
    let detector = OnnxYoloDetector::new(model, DEFAULT_SCORE_FLOOR)?;
    let pipeline = FramePipeline::new(
        Box::new(detector),
        Arc::new(store),
        config,
        Box::new(StdoutPipelineLogger::default()),
    );
    let mut session = RecognitionSession::new(pipeline);

    let writer: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };
    let mut presenter = JsonLinesPresenter::new(writer);
    if skip_empty {
        presenter = presenter.skipping_empty();
    }

    let summary = session.run(source, &mut presenter)?;
    print_summary(&summary);
    Ok(())
}

fn open_source(input: &Path, live: bool) -> Result<Box<dyn FrameSource>, CliError> {
    if live {
        return Ok(Box::new(FfmpegFrameSource::open_live(input)?));
    }
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }
    if is_image_file(input) {
        Ok(Box::new(ImageFileSource::new(input)))
    } else {
        Ok(Box::new(FfmpegFrameSource::open(input)?))
    }
}

fn open_store(
    dir: &Path,
    config: &RecognitionConfig,
) -> Result<IdentityStore, CliError> {
    log::info!("Using identity store {}", dir.display());
    let repository = JsonIdentityRepository::new(dir);
    let hasher = Arc::new(PerceptualHasher::new(config.hash_size));
    Ok(IdentityStore::open(
        Box::new(repository),
        hasher,
        config.match_threshold,
    )?)
}

fn default_store_dir() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| "could not determine data directory; pass --store".into())
}

fn load_image(path: &Path) -> Result<image::RgbImage, CliError> {
    let image = image::open(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    Ok(image.to_rgb8())
}

fn print_summary(summary: &SessionSummary) {
    eprintln!(
        "Processed {} frames ({} dropped, {} skipped)",
        summary.frames_processed, summary.frames_dropped, summary.frames_skipped
    );
    for seen in summary.seen.sorted() {
        eprintln!(
            "  {:<24} first frame {:>6}  seen {:>6}x  best confidence {:.2}",
            seen.status.label(),
            seen.first_frame,
            seen.sightings,
            seen.best_confidence
        );
    }
}
