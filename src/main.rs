use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use spectrum_bars::audio::{BarFrame, Channel, TickOutcome, Visualizer};
use spectrum_bars::config::{Config, SmoothingMode};
use spectrum_bars::graphics::{VisualShape, WireMode};
use spectrum_bars::source::{AudioSource, FifoSource, HostCapture, WavSource};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SmoothingArg {
    None,
    Monstercat,
    Sgs,
}

impl From<SmoothingArg> for SmoothingMode {
    fn from(arg: SmoothingArg) -> Self {
        match arg {
            SmoothingArg::None => SmoothingMode::None,
            SmoothingArg::Monstercat => SmoothingMode::Monstercat,
            SmoothingArg::Sgs => SmoothingMode::Sgs,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeArg {
    Bars,
    Rounded,
    Circle,
    Wire,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WireArg {
    Thin,
    Thick,
    Fill,
    FillInverted,
}

impl From<WireArg> for WireMode {
    fn from(arg: WireArg) -> Self {
        match arg {
            WireArg::Thin => WireMode::Thin,
            WireArg::Thick => WireMode::Thick,
            WireArg::Fill => WireMode::Fill,
            WireArg::FillInverted => WireMode::FillInverted,
        }
    }
}

#[derive(Parser)]
#[command(name = "spectrum-bars")]
#[command(about = "Real-time audio spectrum bars from a fifo, a WAV file or a capture device")]
struct Args {
    /// JSON configuration file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Named pipe carrying 16 bit stereo PCM (e.g. MPD's fifo output)
    #[arg(long, conflicts_with_all = ["wav", "capture"])]
    fifo: Option<PathBuf>,

    /// WAV file to analyse offline
    #[arg(long, conflicts_with = "capture")]
    wav: Option<PathBuf>,

    /// Capture from an input device (default device when no name is given)
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    capture: Option<String>,

    /// Number of bars
    #[arg(long)]
    detail: Option<usize>,

    /// Ticks per second
    #[arg(long)]
    fps: Option<u32>,

    /// Analyse left and right separately
    #[arg(long)]
    stereo: bool,

    #[arg(long, value_enum)]
    smoothing: Option<SmoothingArg>,

    /// Logarithmic frequency mapping
    #[arg(long)]
    log_freq: bool,

    /// Stop after this many ticks
    #[arg(long)]
    frames: Option<u64>,

    /// Print one JSON record per tick instead of a terminal graph
    #[arg(long)]
    json: bool,

    /// Also lay the bars out as this shape and report the geometry size
    #[arg(long, value_enum)]
    shape: Option<ShapeArg>,

    #[arg(long, value_enum, default_value = "thin")]
    wire_mode: WireArg,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    tick: u64,
    outcome: String,
    #[serde(flatten)]
    frame: &'a BarFrame,
    #[serde(skip_serializing_if = "Option::is_none")]
    primitives: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vertices: Option<usize>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(detail) = args.detail {
        config.detail = detail;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if args.stereo {
        config.stereo = true;
    }
    if let Some(smoothing) = args.smoothing {
        config.smoothing = smoothing.into();
    }
    if args.log_freq {
        config.log_freq_scale = true;
    }
    Ok(config)
}

fn open_source(args: &Args, config: &mut Config) -> Result<AudioSource> {
    let source = if let Some(path) = &args.fifo {
        AudioSource::Fifo(FifoSource::new(path))
    } else if let Some(path) = &args.wav {
        let wav = WavSource::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        AudioSource::WavFile(wav)
    } else if let Some(device) = &args.capture {
        let device = (!device.is_empty()).then_some(device.as_str());
        AudioSource::HostCapture(HostCapture::new(device)?)
    } else {
        AudioSource::Silent
    };

    if let Some(rate) = source.sample_rate() {
        if rate != config.sample_rate {
            info!("Using the source's sample rate of {} Hz", rate);
            config.sample_rate = rate;
            config.high_cutoff_freq = config.high_cutoff_freq.min(rate as f64 / 2.0);
        }
    }
    Ok(source)
}

fn shape_from(args: &Args) -> Option<VisualShape> {
    args.shape.map(|shape| match shape {
        ShapeArg::Bars => VisualShape::Bars { rounded: false },
        ShapeArg::Rounded => VisualShape::Bars { rounded: true },
        ShapeArg::Circle => VisualShape::CircleBars {
            padding: 0.0,
            offset_deg: 0.0,
        },
        ShapeArg::Wire => VisualShape::Wire(args.wire_mode.into()),
    })
}

const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn graph_line(frame: &BarFrame, height: f64) -> String {
    let mut line = String::new();
    for (n, channel) in [Channel::Left, Channel::Right].into_iter().enumerate() {
        let Some(bars) = frame.channel(channel) else {
            break;
        };
        if n > 0 {
            line.push('|');
        }
        for bar in bars {
            let level = (bar / height * (LEVELS.len() - 1) as f64).round();
            line.push(LEVELS[(level.max(0.0) as usize).min(LEVELS.len() - 1)]);
        }
    }
    line
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = load_config(&args)?;
    let source = open_source(&args, &mut config)?;
    let config = config.sanitized();

    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("Starting spectrum-bars with a {} source", source.name());
    // files are analysed as fast as they decode, everything else at the frame rate
    let realtime = !matches!(source, AudioSource::WavFile(_));
    let shape = shape_from(&args);
    let visualizer = Visualizer::new(config.clone(), source);

    let frame_time = Duration::from_secs_f64(1.0 / config.fps as f64);
    let height = config.channel_height();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut last = Instant::now();
    let mut tick = 0u64;

    loop {
        if args.frames.is_some_and(|limit| tick >= limit) {
            break;
        }

        let seconds = if realtime {
            let elapsed = last.elapsed();
            if elapsed < frame_time {
                std::thread::sleep(frame_time - elapsed);
            }
            let now = Instant::now();
            let seconds = now.duration_since(last).as_secs_f64();
            last = now;
            seconds
        } else {
            frame_time.as_secs_f64()
        };

        let outcome = visualizer.tick(seconds);
        if outcome == TickOutcome::Contended {
            continue;
        }
        let frame = visualizer.render();

        let geometry = shape.map(|shape| {
            let primitives = shape.layout(&frame, &config);
            let vertices = primitives.iter().map(|p| p.tessellate().vertices.len()).sum();
            (primitives.len(), vertices)
        });

        if args.json {
            let record = FrameRecord {
                tick,
                outcome: format!("{:?}", outcome),
                frame: &frame,
                primitives: geometry.map(|g| g.0),
                vertices: geometry.map(|g| g.1),
            };
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        } else {
            write!(out, "{}", graph_line(&frame, height))?;
            if let Some((primitives, vertices)) = geometry {
                write!(out, "  [{} primitives, {} vertices]", primitives, vertices)?;
            }
            writeln!(out)?;
        }
        out.flush()?;

        tick += 1;
        if visualizer.is_finished() {
            info!("Source finished after {} ticks", tick);
            break;
        }
    }

    Ok(())
}
