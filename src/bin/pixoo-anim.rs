use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pixoo_anim::{
    DeviceConnection, DeviceLink, HttpLink, MediaDecoder, MediaSource, Phase, PipelineConfig,
    SamplingPlan, TransferProtocol, config::DarkenBackground,
    device::memory::RecordingLink,
    media::{decode::is_video_path, export, ffmpeg::FfmpegDecoder},
};

#[derive(Parser, Debug)]
#[command(name = "pixoo-anim", version)]
struct Cli {
    /// JSON pipeline configuration; defaults apply to missing fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert media files into panel-ready GIFs.
    Convert(ConvertArgs),
    /// Convert one file and push it to a panel.
    Send(SendArgs),
    /// Check that a panel answers.
    Probe(ProbeArgs),
    /// Print statistics and the conversion plan for a file.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct SegmentArgs {
    /// Clip start in seconds (video sources only).
    #[arg(long, requires = "end")]
    start: Option<f64>,

    /// Clip end in seconds (video sources only).
    #[arg(long, requires = "start")]
    end: Option<f64>,
}

#[derive(Args, Debug)]
struct EffectArgs {
    /// Dim the background so a bright subject stands out.
    #[arg(long)]
    darken_background: bool,

    /// Darken the edges toward the center with this vignette strength.
    #[arg(long, num_args = 0..=1, default_missing_value = "0.25")]
    center_focus: Option<f32>,
}

impl EffectArgs {
    fn apply(&self, cfg: &PipelineConfig) -> anyhow::Result<PipelineConfig> {
        let mut cfg = cfg.clone();
        if self.darken_background {
            cfg.enhance.darken_background = Some(DarkenBackground::default());
        }
        if let Some(strength) = self.center_focus {
            cfg.enhance.center_focus = Some(strength);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input media files.
    #[arg(long = "in", required = true, num_args = 1..)]
    in_paths: Vec<PathBuf>,

    /// Directory receiving `<name>.gif` per input.
    #[arg(long)]
    out_dir: PathBuf,

    /// Frame ceiling to convert under.
    #[arg(long, value_enum, default_value_t = PhaseChoice::Conversion)]
    phase: PhaseChoice,

    /// Also write an upscaled `<name>.preview.gif`.
    #[arg(long)]
    preview: bool,

    /// Upscale factor for previews.
    #[arg(long, default_value_t = export::DEFAULT_PREVIEW_SCALE)]
    preview_scale: u32,

    /// Worker threads for batch conversion (default: one per core).
    #[arg(long)]
    threads: Option<usize>,

    #[command(flatten)]
    segment: SegmentArgs,

    #[command(flatten)]
    effects: EffectArgs,
}

#[derive(Parser, Debug)]
struct SendArgs {
    /// Input media file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Panel address, `host` or `host:port`.
    #[arg(long, required_unless_present = "dry_run")]
    device: Option<String>,

    /// Override the frame duration in milliseconds.
    #[arg(long)]
    speed: Option<u32>,

    /// Run the full protocol against an in-memory panel.
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    segment: SegmentArgs,

    #[command(flatten)]
    effects: EffectArgs,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Panel address, `host` or `host:port`.
    #[arg(long)]
    device: String,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input media file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame ceiling to plan under.
    #[arg(long, value_enum, default_value_t = PhaseChoice::Transfer)]
    phase: PhaseChoice,

    #[command(flatten)]
    segment: SegmentArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PhaseChoice {
    Conversion,
    Transfer,
}

impl From<PhaseChoice> for Phase {
    fn from(p: PhaseChoice) -> Self {
        match p {
            PhaseChoice::Conversion => Phase::Conversion,
            PhaseChoice::Transfer => Phase::Transfer,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.cmd {
        Command::Convert(args) => cmd_convert(args, &cfg),
        Command::Send(args) => cmd_send(args, &cfg),
        Command::Probe(args) => cmd_probe(args, &cfg),
        Command::Inspect(args) => cmd_inspect(args, &cfg),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn media_source(path: &Path, segment: &SegmentArgs) -> MediaSource {
    let src = MediaSource::path(path);
    match (segment.start, segment.end) {
        (Some(start), Some(end)) => src.with_segment(start, end),
        _ => src,
    }
}

fn decode(
    path: &Path,
    segment: &SegmentArgs,
    cfg: &PipelineConfig,
    phase: Phase,
) -> anyhow::Result<pixoo_anim::DecodedMedia> {
    let source = media_source(path, segment);
    let media = if is_video_path(path) {
        FfmpegDecoder::new(cfg, phase).decode(&source)
    } else {
        pixoo_anim::ImageDecoder::from_config(cfg).decode(&source)
    };
    media.with_context(|| format!("decode '{}'", path.display()))
}

fn output_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("animation")
        .to_string()
}

fn cmd_convert(args: ConvertArgs, cfg: &PipelineConfig) -> anyhow::Result<()> {
    let cfg = &args.effects.apply(cfg)?;
    let phase = Phase::from(args.phase);
    let media = args
        .in_paths
        .iter()
        .map(|p| decode(p, &args.segment, cfg, phase))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let results = pixoo_anim::convert_batch(&media, phase, cfg, args.threads)?;

    let mut failed = 0usize;
    for (path, result) in args.in_paths.iter().zip(results) {
        let anim = match result {
            Ok(anim) => anim,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                failed += 1;
                continue;
            }
        };

        let stem = output_stem(path);
        let out = args.out_dir.join(format!("{stem}.gif"));
        export::write_gif(&anim.sequence, &out)?;
        eprintln!(
            "wrote {} ({} frames, {} ms/frame, {} colors)",
            out.display(),
            anim.sequence.len(),
            anim.sequence.frame_duration_ms(),
            anim.palette.len()
        );

        if args.preview {
            let preview = args.out_dir.join(format!("{stem}.preview.gif"));
            export::write_preview_gif(&anim.sequence, &preview, args.preview_scale)?;
            eprintln!("wrote {}", preview.display());
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} input(s) failed to convert", args.in_paths.len());
    }
    Ok(())
}

fn cmd_send(args: SendArgs, cfg: &PipelineConfig) -> anyhow::Result<()> {
    let cfg = &args.effects.apply(cfg)?;
    let media = decode(&args.in_path, &args.segment, cfg, Phase::Transfer)?;
    let anim = pixoo_anim::convert_with_progress(&media, Phase::Transfer, cfg, |done, total| {
        tracing::debug!(done, total, "frame converted")
    })?;
    let mut seq = anim.for_transfer(cfg.transfer_frame_ceiling)?;
    if let Some(speed) = args.speed {
        seq = seq.with_frame_duration_ms(speed.max(cfg.min_frame_duration_ms))?;
    }

    let link: Box<dyn DeviceLink> = match (&args.device, args.dry_run) {
        (_, true) => Box::new(RecordingLink::new()),
        (Some(device), false) => Box::new(HttpLink::new(device, &cfg.device)?),
        (None, false) => anyhow::bail!("--device is required unless --dry-run is set"),
    };
    let target = match (&args.device, args.dry_run) {
        (Some(device), false) => device.as_str(),
        _ => "in-memory panel",
    };
    let conn = DeviceConnection::open(link).with_context(|| format!("probe '{target}'"))?;

    let total = seq.len();
    let frames_sent = TransferProtocol::new(&conn, cfg.transfer_frame_ceiling)
        .with_progress(|sent, total| tracing::info!(sent, total, "frame delivered"))
        .transfer(seq)?
        .into_result()?;

    eprintln!("sent {frames_sent}/{total} frame(s) to {target}");
    Ok(())
}

fn cmd_probe(args: ProbeArgs, cfg: &PipelineConfig) -> anyhow::Result<()> {
    let link = HttpLink::new(&args.device, &cfg.device)?;
    let addr = link.addr();
    DeviceConnection::open(link).with_context(|| format!("probe '{}'", args.device))?;
    println!("{addr}: ok");
    Ok(())
}

fn cmd_inspect(args: InspectArgs, cfg: &PipelineConfig) -> anyhow::Result<()> {
    let phase = Phase::from(args.phase);
    let media = decode(&args.in_path, &args.segment, cfg, phase)?;
    let plan = SamplingPlan::derive(media.frames.len(), media.natural_duration_ms, phase, cfg)?;
    let anim = pixoo_anim::convert(&media, phase, cfg)?;

    let first = &media.frames[0];
    println!("source:        {}", args.in_path.display());
    println!("source frames: {} ({}x{})", media.frames.len(), first.width, first.height);
    println!("natural:       {} ms", media.natural_duration_ms);
    println!("phase:         {phase} (ceiling {})", cfg.ceiling(phase));
    println!("plan:          {} frames x {} ms", plan.frame_count, plan.frame_duration_ms);
    println!("brightness:    {:.3}", anim.stats.brightness);
    println!("contrast:      {:.1}", anim.stats.contrast);
    match anim.profile {
        Some(p) => println!("profile:       {p}"),
        None => println!("profile:       (enhancement disabled)"),
    }
    println!("palette:       {} colors", anim.palette.len());
    println!("effective fps: {:.2}", cfg.effective_fps());
    Ok(())
}
