use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

use framecast::{
    CaptureConfig, CaptureController, Fps, MemoryWriterFactory, OrbitScene, OrbitSceneOpts,
    PixelSize, StartOptions, WriterFactory,
};

#[derive(Parser, Debug)]
#[command(name = "framecast", version)]
struct Cli {
    /// JSON capture config; every field is optional.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record the orbit scene for a while (requires `ffmpeg` on PATH).
    Record(RecordArgs),
    /// Encode a directory of PNG stills, in file-name order.
    Encode(EncodeArgs),
    /// Render one scene frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Args, Debug)]
struct SceneArgs {
    /// Scene width in points.
    #[arg(long, default_value_t = 320.0)]
    width: f64,

    /// Scene height in points.
    #[arg(long, default_value_t = 320.0)]
    height: f64,

    /// Pixels per point.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Number of balls.
    #[arg(long, default_value_t = 10)]
    balls: u32,
}

impl SceneArgs {
    fn scene(&self) -> anyhow::Result<OrbitScene> {
        let opts = OrbitSceneOpts {
            width: self.width,
            height: self.height,
            scale: self.scale,
            balls: self.balls,
            ..OrbitSceneOpts::default()
        };
        Ok(OrbitScene::new(opts)?)
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output MP4 path. Defaults to a fresh file in the capture directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Encoded size as `WxH`. Defaults to the first frame's size.
    #[arg(long, value_parser = parse_size)]
    size: Option<PixelSize>,

    /// Override the configured frame rate (frames per second).
    #[arg(long)]
    fps: Option<u32>,

    /// Record into memory and write a JSON summary instead of invoking `ffmpeg`.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Capture duration in seconds.
    #[arg(long, default_value_t = 3.0)]
    seconds: f64,

    #[command(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    scene: SceneArgs,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Directory of PNG stills.
    #[arg(long = "in")]
    in_dir: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Scene time in seconds.
    #[arg(long, default_value_t = 0.0)]
    t: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    scene: SceneArgs,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Record(args) => cmd_record(cli.config.as_deref(), args),
        Command::Encode(args) => cmd_encode(cli.config.as_deref(), args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_size(s: &str) -> Result<PixelSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    if w == 0 || h == 0 {
        return Err("width and height must be > 0".to_string());
    }
    Ok(PixelSize::new(w, h))
}

fn load_config(path: Option<&Path>, fps: Option<u32>) -> anyhow::Result<CaptureConfig> {
    let mut cfg = match path {
        Some(p) => CaptureConfig::from_path(p)?,
        None => CaptureConfig::default(),
    };
    if let Some(fps) = fps {
        cfg.fps = Fps::new(fps, 1)?;
    }
    Ok(cfg)
}

fn controller(cfg: CaptureConfig, dry_run: bool) -> anyhow::Result<CaptureController> {
    let ctl = if dry_run {
        let factory: Arc<dyn WriterFactory> = Arc::new(MemoryWriterFactory::new());
        CaptureController::new(cfg, factory)?
    } else {
        CaptureController::with_ffmpeg(cfg)?
    };
    Ok(ctl)
}

fn start_options(output: &OutputArgs) -> StartOptions {
    StartOptions {
        target_size: output.size,
        output_path: output.out.clone(),
    }
}

fn cmd_record(config: Option<&Path>, args: RecordArgs) -> anyhow::Result<()> {
    let duration = Duration::try_from_secs_f64(args.seconds)
        .with_context(|| format!("invalid --seconds {}", args.seconds))?;
    let cfg = load_config(config, args.output.fps)?;
    let interval = cfg.sample_interval();
    let scene = args.scene.scene()?;

    let ctl = controller(cfg, args.output.dry_run)?;
    let done = ctl.start_with_source(start_options(&args.output), Box::new(scene), interval)?;
    std::thread::sleep(duration);
    ctl.stop();
    let path = done.wait().context("record")?;

    let stats = ctl.stats();
    eprintln!(
        "captured {} frames ({} dropped)",
        stats.frames_encoded, stats.frames_dropped
    );
    println!("{}", path.display());
    Ok(())
}

fn cmd_encode(config: Option<&Path>, args: EncodeArgs) -> anyhow::Result<()> {
    let images = framecast::load_png_dir(&args.in_dir)
        .with_context(|| format!("load stills from '{}'", args.in_dir.display()))?;
    let cfg = load_config(config, args.output.fps)?;
    let factory: Arc<dyn WriterFactory> = if args.output.dry_run {
        Arc::new(MemoryWriterFactory::new())
    } else {
        Arc::new(framecast::FfmpegWriterFactory::new(cfg.ffmpeg_opts()))
    };
    let count = images.len();
    let path = framecast::encode_image_pack(images, start_options(&args.output), cfg, factory)
        .context("encode")?;
    eprintln!("encoded {count} stills");
    println!("{}", path.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.t.is_finite(), "--t must be finite");
    let still = args.scene.scene()?.render(args.t)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    still.save_png(&args.out)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
