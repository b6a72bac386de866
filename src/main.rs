//! Video Renderer CLI
//!
//! Command-line interface for testing the renderer without a media stack.

use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::{bounded, TrySendError};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use video_renderer::{
    available_backends, create_renderer,
    pattern::Pattern,
    shader::{all_programs, ShaderLibrary},
    BackendKind, ColorMatrix, FrameBuffer, FrameOutcome, HeadlessWindow, PixelFormat,
    RendererConfig, Rotation,
};

/// Frame format for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Format {
    Argb,
    I420,
    I444,
    #[default]
    Nv12,
}

impl From<Format> for PixelFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Argb => PixelFormat::Argb,
            Format::I420 => PixelFormat::I420,
            Format::I444 => PixelFormat::I444,
            Format::Nv12 => PixelFormat::Nv12,
        }
    }
}

/// Test pattern for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Content {
    Bars,
    Ramp,
    #[default]
    Moving,
}

impl From<Content> for Pattern {
    fn from(c: Content) -> Self {
        match c {
            Content::Bars => Pattern::Bars,
            Content::Ramp => Pattern::Ramp,
            Content::Moving => Pattern::Moving,
        }
    }
}

/// Color matrix for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Matrix {
    #[default]
    Bt601,
    Bt709,
}

impl From<Matrix> for ColorMatrix {
    fn from(m: Matrix) -> Self {
        match m {
            Matrix::Bt601 => ColorMatrix::Bt601,
            Matrix::Bt709 => ColorMatrix::Bt709,
        }
    }
}

#[derive(Parser)]
#[command(name = "video-renderer")]
#[command(about = "GPU video frame renderer - Upload, Convert, Sharpen, Present")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show available backends and the effective configuration
    Info {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Render a synthetic stream on the software device
    Render {
        /// Source frame format
        #[arg(short, long, value_enum, default_value = "nv12")]
        format: Format,

        /// Source resolution (e.g., 1280x720)
        #[arg(short, long, default_value = "1280x720")]
        source: String,

        /// Window client size (e.g., 1920x1080)
        #[arg(short, long, default_value = "1920x1080")]
        window: String,

        /// Number of frames the decode thread produces
        #[arg(short = 'n', long, default_value = "120")]
        frames: u32,

        /// Image content
        #[arg(short, long, value_enum, default_value = "moving")]
        pattern: Content,

        /// Color matrix for YUV content
        #[arg(short, long, value_enum, default_value = "bt601")]
        matrix: Matrix,

        /// Unsharp amount (0 = off, up to 10)
        #[arg(long, default_value = "0")]
        sharpen: f32,

        /// Rotation in degrees (0, 90, 180, 270)
        #[arg(long, default_value = "0")]
        rotation: u32,

        /// Stretch instead of letterboxing
        #[arg(long)]
        stretch: bool,

        /// Halve the window size after this many frames
        #[arg(long)]
        resize_at: Option<u32>,

        /// Decode rate in frames per second (0 = as fast as possible)
        #[arg(long, default_value = "0")]
        fps: u32,
    },

    /// Check a directory of precompiled shader bytecode
    Shaders {
        /// Directory holding `<program>.cso` files
        dir: PathBuf,
    },

    /// Print the default configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("video_renderer=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { config } => cmd_info(config),
        Commands::Render {
            format,
            source,
            window,
            frames,
            pattern,
            matrix,
            sharpen,
            rotation,
            stretch,
            resize_at,
            fps,
        } => {
            let rotation = Rotation::from_degrees(rotation)
                .ok_or_else(|| anyhow::anyhow!("rotation must be 0, 90, 180 or 270"))?;
            let config = RendererConfig::default()
                .with_backend(BackendKind::Soft)
                .with_color_matrix(matrix.into())
                .with_sharpen(sharpen)
                .with_preserve_aspect(!stretch)
                .with_rotation(rotation);
            config.validate()?;
            let job = RenderJob {
                format: format.into(),
                source: parse_resolution(&source)?,
                window: parse_resolution(&window)?,
                frames,
                pattern: pattern.into(),
                matrix: matrix.into(),
                resize_at,
                fps,
            };
            cmd_render(config, job)
        }
        Commands::Shaders { dir } => cmd_shaders(dir),
        Commands::Config => cmd_config(),
    }
}

fn parse_resolution(s: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| anyhow::anyhow!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let (w, h) = (w.trim().parse()?, h.trim().parse()?);
    if w == 0 || h == 0 {
        anyhow::bail!("resolution must be non-zero, got '{}'", s);
    }
    Ok((w, h))
}

fn cmd_info(config: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Video Renderer {}", video_renderer::VERSION);
    println!("===================\n");

    println!("=== Backends ===");
    for backend in available_backends() {
        println!("  - {}", backend);
    }
    println!("Auto selects: {}", BackendKind::Auto.resolve());

    let config = match config {
        Some(path) => RendererConfig::from_file(&path)?,
        None => RendererConfig::default(),
    };

    println!("\n=== Configuration ===");
    println!("Backend: {}", config.backend);
    println!("Color matrix: {}", config.color_matrix);
    println!("Sharpen: {}", config.sharpen);
    println!(
        "Aspect: {}",
        if config.preserve_aspect { "letterbox" } else { "stretch" }
    );
    println!("Rotation: {} degrees", config.rotation.degrees());
    match &config.shader_dir {
        Some(dir) => println!("Shaders: {}", dir.display()),
        None => println!("Shaders: none (software backend only)"),
    }

    Ok(())
}

struct RenderJob {
    format: PixelFormat,
    source: (u32, u32),
    window: (u32, u32),
    frames: u32,
    pattern: Pattern,
    matrix: ColorMatrix,
    resize_at: Option<u32>,
    fps: u32,
}

fn cmd_render(config: RendererConfig, job: RenderJob) -> anyhow::Result<()> {
    println!("Video Renderer Headless Stream");
    println!("==============================\n");
    println!("Format: {}", job.format);
    println!("Source: {}x{}", job.source.0, job.source.1);
    println!("Window: {}x{}", job.window.0, job.window.1);
    println!("Frames: {}", job.frames);
    println!();

    let renderer = create_renderer(&config)?;
    let window = Arc::new(HeadlessWindow::new(job.window.0, job.window.1));
    renderer.init(window.clone())?;

    // Latest frame wins: the decoder never blocks on a slow renderer
    let (tx, rx) = bounded::<(u32, FrameBuffer)>(1);
    let decoder = {
        let RenderJob {
            format,
            source: (width, height),
            frames,
            pattern,
            matrix,
            fps,
            ..
        } = job;
        thread::Builder::new().name("decode".into()).spawn(move || {
            let interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
            let mut skipped = 0u32;
            for index in 0..frames {
                let frame = pattern.frame(width, height, format, matrix, index as u64);
                match tx.try_send((index, frame)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => skipped += 1,
                    Err(TrySendError::Disconnected(_)) => break,
                }
                if let Some(interval) = interval {
                    thread::sleep(interval);
                }
            }
            skipped
        })?
    };

    let start = Instant::now();
    let mut resized = false;
    for (index, frame) in rx.iter() {
        if let Some(at) = job.resize_at {
            if !resized && index >= at {
                window.set_size((job.window.0 / 2).max(1), (job.window.1 / 2).max(1));
                renderer.resize()?;
                resized = true;
            }
        }
        if renderer.render(&frame.as_frame()) == FrameOutcome::Dropped {
            tracing::debug!("Frame {} dropped", index);
        }
    }
    let elapsed = start.elapsed();

    let skipped = decoder
        .join()
        .map_err(|_| anyhow::anyhow!("decode thread panicked"))?;
    let stats = renderer.stats();
    renderer.destroy();

    let fps = stats.frames_presented as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    println!("Results:");
    println!("  Total time: {:.2}s", elapsed.as_secs_f64());
    println!("  Render FPS: {:.1}", fps);
    println!("\nRenderer Stats:");
    println!("  Frames presented: {}", stats.frames_presented);
    println!("  Frames dropped: {}", stats.frames_dropped);
    println!("  Skipped by decoder: {}", skipped);
    println!("  Texture reallocations: {}", stats.texture_reallocations);
    println!("  Resizes: {}", stats.resizes);
    println!("  Device resets: {}", stats.device_resets);

    Ok(())
}

fn cmd_shaders(dir: PathBuf) -> anyhow::Result<()> {
    let library = ShaderLibrary::load_dir(&dir)?;

    println!("Shader bytecode in {}", dir.display());
    println!("=================\n");
    println!(
        "  {:<16} {}",
        "vertex",
        if library.vertex().is_ok() { "ok" } else { "missing" }
    );
    for program in all_programs() {
        let status = match library.program(program) {
            Ok(bytes) => format!("ok ({} bytes)", bytes.len()),
            Err(_) => "missing".to_string(),
        };
        println!("  {:<16} {}", program.file_stem(), status);
    }

    if library.is_complete() {
        println!("\nAll programs present.");
    } else {
        println!("\nMissing: {}", library.missing().join(", "));
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    print!("{}", RendererConfig::default().to_toml_string()?);
    Ok(())
}
