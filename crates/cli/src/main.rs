use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use faceprobe_core::classification::domain::face_classifier::FaceClassifier;
use faceprobe_core::classification::domain::result_table::ResultTable;
use faceprobe_core::classification::infrastructure::onnx_attribute_classifier::OnnxAttributeClassifier;
use faceprobe_core::classification::infrastructure::table_export::{
    export_table, write_csv, write_json, ExportFormat,
};
use faceprobe_core::detection::domain::face_detector::FaceDetector;
use faceprobe_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use faceprobe_core::pipeline::analyzer_config::AnalyzerConfig;
use faceprobe_core::pipeline::face_analyzer::FaceAnalyzer;
use faceprobe_core::pipeline::image_analysis_use_case::ImageAnalysisUseCase;
use faceprobe_core::pipeline::keyframe_analysis_use_case::{ExtractOptions, KeyframeAnalysisUseCase};
use faceprobe_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use faceprobe_core::pipeline::precomputed_analysis_use_case::PrecomputedAnalysisUseCase;
use faceprobe_core::pipeline::tracking_analysis_use_case::TrackingAnalysisUseCase;
use faceprobe_core::pipeline::video_analysis_use_case::VideoAnalysisUseCase;
use faceprobe_core::preprocessing::infrastructure::crop_preprocessor::CropPreprocessor;
use faceprobe_core::preprocessing::infrastructure::eye_line_aligner::EyeLineAligner;
use faceprobe_core::shared::bbox::BoundingBox;
use faceprobe_core::shared::constants::{
    CLASSIFIER_MODEL_NAME, DEFAULT_BATCH_LEN, DEFAULT_DETECT_CONFIDENCE, DETECTOR_MODEL_NAME,
};
use faceprobe_core::shared::model_resolver::{self, ProgressFn};

/// Face detection and sex/age classification for images and videos.
#[derive(Parser)]
#[command(name = "faceprobe", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Face detector ONNX model (default: cached model).
    #[arg(long, global = true)]
    detector_model: Option<PathBuf>,

    /// Where to download the detector model if it is not cached.
    #[arg(long, global = true)]
    detector_url: Option<String>,

    /// Attribute classifier ONNX model (default: cached model).
    #[arg(long, global = true)]
    classifier_model: Option<PathBuf>,

    /// Where to download the classifier model if it is not cached.
    #[arg(long, global = true)]
    classifier_url: Option<String>,

    /// Faces per classifier call.
    #[arg(long, global = true, default_value_t = DEFAULT_BATCH_LEN)]
    batch_len: usize,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true, default_value_t = DEFAULT_DETECT_CONFIDENCE)]
    confidence: f64,

    /// Box enlargement before cropping (default: classifier's own).
    #[arg(long, global = true)]
    bbox_scale: Option<f64>,

    /// Skip eye-line alignment of faces.
    #[arg(long, global = true)]
    no_align: bool,

    /// Result file (default: CSV on stdout).
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Result format (default: from the output extension).
    #[arg(long, global = true, value_enum)]
    format: Option<Format>,

    /// Log every frame.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze image files or directories of images.
    Image {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Analyze every frame of a video, or a subsampled selection.
    Video {
        input: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
    },
    /// Analyze only the keyframes of a video.
    Keyframes { input: PathBuf },
    /// Analyze a video with face tracking and per-face averaged results.
    Track {
        input: PathBuf,
        /// Run full detection once every N analyzed frames.
        #[arg(long, default_value_t = 1)]
        detection_period: usize,
        #[command(flatten)]
        sampling: SamplingArgs,
    },
    /// Classify faces at known positions instead of detecting them.
    Precomputed {
        input: PathBuf,
        /// JSON array with one entry per analyzed frame: a box
        /// `[x1, y1, x2, y2]` or a list of boxes.
        #[arg(long)]
        boxes: PathBuf,
        /// Target analysis frame rate.
        #[arg(long)]
        fps: Option<f64>,
        /// First analyzed frame.
        #[arg(long, default_value_t = 0)]
        start_frame: u64,
    },
    /// Analyze keyframes and save every detected face as an image.
    Extract {
        input: PathBuf,
        /// Directory receiving one image per result row.
        #[arg(long)]
        faces_dir: PathBuf,
        /// Size of the saved faces, e.g. `224x224` (default: classifier input).
        #[arg(long, value_parser = parse_shape)]
        face_size: Option<(u32, u32)>,
        /// Image file extension.
        #[arg(long, default_value = "png")]
        ext: String,
    },
}

#[derive(Args)]
struct SamplingArgs {
    /// Target analysis frame rate (default: every frame).
    #[arg(long)]
    fps: Option<f64>,
    /// Skip the first milliseconds of the video.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset_ms: i64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => ExportFormat::Csv,
            Format::Json => ExportFormat::Json,
        }
    }
}

/// One entry of the precomputed boxes file.
#[derive(Deserialize)]
#[serde(untagged)]
enum FrameBoxes {
    One([i32; 4]),
    Many(Vec<[i32; 4]>),
}

impl FrameBoxes {
    fn into_boxes(self) -> Vec<BoundingBox> {
        match self {
            FrameBoxes::One(b) => vec![BoundingBox::from(b)],
            FrameBoxes::Many(list) => list.into_iter().map(BoundingBox::from).collect(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.common.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let common = cli.common;
    validate(&common)?;

    let table = match cli.command {
        Command::Image { inputs } => {
            let analyzer = build_analyzer(&common, AnalyzerConfig::for_classifier)?;
            ImageAnalysisUseCase::new(analyzer, build_detector(&common)?).execute(&inputs)?
        }
        Command::Video { input, sampling } => {
            let analyzer = build_analyzer(&common, AnalyzerConfig::for_classifier)?;
            VideoAnalysisUseCase::new(analyzer, build_detector(&common)?)
                .with_fps(sampling.fps)
                .with_offset_ms(sampling.offset_ms)
                .execute(&input)?
        }
        Command::Keyframes { input } => {
            let analyzer = build_analyzer(&common, AnalyzerConfig::for_classifier)?;
            KeyframeAnalysisUseCase::new(analyzer, build_detector(&common)?).execute(&input)?
        }
        Command::Track {
            input,
            detection_period,
            sampling,
        } => {
            let analyzer = build_analyzer(&common, AnalyzerConfig::for_classifier)?;
            TrackingAnalysisUseCase::new(analyzer, build_detector(&common)?, detection_period)?
                .with_fps(sampling.fps)
                .with_offset_ms(sampling.offset_ms)
                .execute(&input)?
        }
        Command::Precomputed {
            input,
            boxes,
            fps,
            start_frame,
        } => {
            let boxes = read_boxes(&boxes)?;
            let analyzer = build_analyzer(&common, AnalyzerConfig::for_precomputed)?;
            PrecomputedAnalysisUseCase::new(analyzer)
                .with_fps(fps)
                .with_start_frame(start_frame)
                .execute(&input, boxes)?
        }
        Command::Extract {
            input,
            faces_dir,
            face_size,
            ext,
        } => {
            let analyzer = build_analyzer(&common, AnalyzerConfig::for_classifier)?;
            let mut use_case = KeyframeAnalysisUseCase::new(analyzer, build_detector(&common)?);
            let table = use_case.execute(&input)?;
            let options = ExtractOptions {
                target_shape: face_size,
                bbox_scale: None,
                extension: ext,
            };
            use_case.extract_faces(&table, &input, &faces_dir, &options)?;
            table
        }
    };

    write_result(&table, &common)
}

fn build_analyzer(
    common: &CommonArgs,
    config_for: fn(&dyn FaceClassifier) -> AnalyzerConfig,
) -> Result<FaceAnalyzer, Box<dyn std::error::Error>> {
    let model = resolve_model(
        common.classifier_model.as_deref(),
        CLASSIFIER_MODEL_NAME,
        common.classifier_url.as_deref(),
    )?;
    let classifier = OnnxAttributeClassifier::new(&model)?;

    let mut config = config_for(&classifier)
        .with_batch_len(common.batch_len)
        .with_verbose(common.verbose);
    if let Some(scale) = common.bbox_scale {
        config.bbox_scale = scale;
    }

    let mut analyzer = FaceAnalyzer::new(Box::new(classifier), Box::new(CropPreprocessor::new()), config)?
        .with_logger(Box::new(StdoutPipelineLogger::default()));
    if !common.no_align {
        analyzer = analyzer.with_aligner(Box::new(EyeLineAligner::default()));
    }
    Ok(analyzer)
}

fn build_detector(common: &CommonArgs) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model = resolve_model(
        common.detector_model.as_deref(),
        DETECTOR_MODEL_NAME,
        common.detector_url.as_deref(),
    )?;
    Ok(Box::new(OnnxFaceDetector::new(&model, common.confidence)?))
}

fn resolve_model(
    explicit: Option<&Path>,
    name: &str,
    url: Option<&str>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {name}");
    let cache_dir = model_resolver::model_cache_dir()?;
    let progress: ProgressFn = Box::new(download_progress);
    let path = model_resolver::resolve(explicit, name, &cache_dir, url, Some(progress))?;
    Ok(path)
}

fn read_boxes(path: &Path) -> Result<Vec<Vec<BoundingBox>>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read boxes file {}: {e}", path.display()))?;
    let entries: Vec<FrameBoxes> = serde_json::from_str(&text)?;
    Ok(entries.into_iter().map(FrameBoxes::into_boxes).collect())
}

fn write_result(table: &ResultTable, common: &CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    match &common.output {
        Some(path) => {
            let format = common
                .format
                .map(ExportFormat::from)
                .unwrap_or_else(|| ExportFormat::from_path(path));
            export_table(table, path, format)?;
            log::info!("Results written to {}", path.display());
        }
        None => match common.format {
            Some(Format::Json) => {
                write_json(table, io::stdout().lock())?;
                println!();
            }
            _ => write_csv(table, io::stdout().lock())?,
        },
    }
    Ok(())
}

fn validate(common: &CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&common.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            common.confidence
        )
        .into());
    }
    if common.batch_len == 0 {
        return Err("Batch length must be at least 1".into());
    }
    if let Some(scale) = common.bbox_scale {
        if scale <= 0.0 {
            return Err(format!("Box scale must be positive, got {scale}").into());
        }
    }
    Ok(())
}

fn parse_shape(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    if w == 0 || h == 0 {
        return Err(format!("face size must be non-zero, got '{s}'"));
    }
    Ok((w, h))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxes_accept_single_and_lists() {
        let entries: Vec<FrameBoxes> =
            serde_json::from_str("[[1, 2, 3, 4], [], [[0, 0, 5, 5], [6, 6, 9, 9]]]").unwrap();
        let boxes: Vec<Vec<BoundingBox>> = entries.into_iter().map(FrameBoxes::into_boxes).collect();

        assert_eq!(boxes[0], vec![BoundingBox::new(1, 2, 3, 4)]);
        assert!(boxes[1].is_empty());
        assert_eq!(boxes[2].len(), 2);
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!(parse_shape("224x200"), Ok((224, 200)));
        assert!(parse_shape("224").is_err());
        assert!(parse_shape("0x10").is_err());
    }

    #[test]
    fn test_cli_parses_track_command() {
        let cli = Cli::try_parse_from([
            "faceprobe",
            "track",
            "clip.mp4",
            "--detection-period",
            "5",
            "--fps",
            "10",
            "--offset-ms",
            "-50",
            "--batch-len",
            "8",
        ])
        .unwrap();

        assert_eq!(cli.common.batch_len, 8);
        match cli.command {
            Command::Track {
                detection_period,
                sampling,
                ..
            } => {
                assert_eq!(detection_period, 5);
                assert_eq!(sampling.fps, Some(10.0));
                assert_eq!(sampling.offset_ms, -50);
            }
            _ => panic!("expected track"),
        }
    }
}
