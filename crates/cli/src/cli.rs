//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{ColorResolution, DepthMode, Fps, ImageFormat};
use std::path::PathBuf;

/// Depthfusion - capture runtime for a multi-camera depth device
#[derive(Parser, Debug)]
#[command(
    name = "depthfusion",
    author,
    version,
    about = "Depth camera capture, calibration and transformation runtime",
    long_about = "A capture runtime for a multi-camera depth device.\n\n\
                  Validates factory calibration blobs, prints mode-specific \n\
                  calibration, and streams synchronized captures from mock \n\
                  sources with live metrics."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DEPTHFUSION_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DEPTHFUSION_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream synchronized captures from mock sources
    Stream(StreamArgs),

    /// Validate a factory calibration blob without streaming
    Validate(ValidateArgs),

    /// Display mode-specific calibration information
    Info(InfoArgs),
}

/// Arguments for the `stream` command
#[derive(Parser, Debug, Clone)]
pub struct StreamArgs {
    /// Path to a factory calibration blob (omit for the built-in mock)
    #[arg(short, long, env = "DEPTHFUSION_CALIBRATION")]
    pub calibration: Option<PathBuf>,

    /// Depth camera mode
    #[arg(long, value_enum, default_value = "nfov-unbinned")]
    pub depth_mode: DepthModeArg,

    /// Color camera resolution
    #[arg(long, value_enum, default_value = "r720p")]
    pub color_resolution: ColorResolutionArg,

    /// Color pixel format
    #[arg(long, value_enum, default_value = "bgra32")]
    pub color_format: ColorFormatArg,

    /// Capture frame rate
    #[arg(long, value_enum, default_value = "fps30")]
    pub fps: FpsArg,

    /// Drop captures missing an expected frame instead of emitting them
    #[arg(long)]
    pub synchronized_only: bool,

    /// Depth capture delay relative to color, microseconds
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub depth_delay_usec: i64,

    /// Maximum number of captures to stream (0 = unlimited)
    #[arg(long, default_value = "0", env = "DEPTHFUSION_MAX_CAPTURES")]
    pub max_captures: u64,

    /// Streaming duration in seconds (0 = until interrupted)
    #[arg(long, default_value = "0", env = "DEPTHFUSION_DURATION")]
    pub duration: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DEPTHFUSION_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the calibration blob to validate
    #[arg(short, long)]
    pub calibration: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to a factory calibration blob (omit for the built-in mock)
    #[arg(short, long)]
    pub calibration: Option<PathBuf>,

    /// Depth camera mode the calibration is adjusted for
    #[arg(long, value_enum, default_value = "nfov-unbinned")]
    pub depth_mode: DepthModeArg,

    /// Color resolution the calibration is adjusted for
    #[arg(long, value_enum, default_value = "r720p")]
    pub color_resolution: ColorResolutionArg,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Depth mode as a CLI value
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DepthModeArg {
    Off,
    Nfov2x2Binned,
    NfovUnbinned,
    Wfov2x2Binned,
    WfovUnbinned,
    PassiveIr,
}

impl From<DepthModeArg> for DepthMode {
    fn from(arg: DepthModeArg) -> Self {
        match arg {
            DepthModeArg::Off => DepthMode::Off,
            DepthModeArg::Nfov2x2Binned => DepthMode::Nfov2x2Binned,
            DepthModeArg::NfovUnbinned => DepthMode::NfovUnbinned,
            DepthModeArg::Wfov2x2Binned => DepthMode::Wfov2x2Binned,
            DepthModeArg::WfovUnbinned => DepthMode::WfovUnbinned,
            DepthModeArg::PassiveIr => DepthMode::PassiveIr,
        }
    }
}

/// Color resolution as a CLI value
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ColorResolutionArg {
    Off,
    R720p,
    R1080p,
    R1440p,
    R1536p,
    R2160p,
    R3072p,
}

impl From<ColorResolutionArg> for ColorResolution {
    fn from(arg: ColorResolutionArg) -> Self {
        match arg {
            ColorResolutionArg::Off => ColorResolution::Off,
            ColorResolutionArg::R720p => ColorResolution::R720p,
            ColorResolutionArg::R1080p => ColorResolution::R1080p,
            ColorResolutionArg::R1440p => ColorResolution::R1440p,
            ColorResolutionArg::R1536p => ColorResolution::R1536p,
            ColorResolutionArg::R2160p => ColorResolution::R2160p,
            ColorResolutionArg::R3072p => ColorResolution::R3072p,
        }
    }
}

/// Color pixel format as a CLI value
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ColorFormatArg {
    Mjpg,
    Nv12,
    Yuy2,
    Bgra32,
}

impl From<ColorFormatArg> for ImageFormat {
    fn from(arg: ColorFormatArg) -> Self {
        match arg {
            ColorFormatArg::Mjpg => ImageFormat::ColorMjpg,
            ColorFormatArg::Nv12 => ImageFormat::ColorNv12,
            ColorFormatArg::Yuy2 => ImageFormat::ColorYuy2,
            ColorFormatArg::Bgra32 => ImageFormat::ColorBgra32,
        }
    }
}

/// Frame rate as a CLI value
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FpsArg {
    Fps5,
    Fps15,
    Fps30,
}

impl From<FpsArg> for Fps {
    fn from(arg: FpsArg) -> Self {
        match arg {
            FpsArg::Fps5 => Fps::Fps5,
            FpsArg::Fps15 => Fps::Fps15,
            FpsArg::Fps30 => Fps::Fps30,
        }
    }
}
