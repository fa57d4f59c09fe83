//! Lobby CLI: realtime player for the background-music engine.
//!
//! The engine and its control loop stay on the main thread; the renderer
//! half of the realtime context moves into the cpal callback.

use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use lobby_engine::realtime::DEFAULT_CAPACITY;
use lobby_engine::{EngineConfig, MusicEngine, Renderer, TransportState};
use tracing_subscriber::EnvFilter;

/// Longest the control loop sleeps between polls.
const MAX_SLEEP: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(author, version, about = "Procedural background music, live", long_about = None)]
struct Args {
    /// Print the available output devices and exit.
    #[arg(long)]
    list_devices: bool,
    /// Output device name (default device when absent).
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    sample_rate: Option<u32>,
    #[arg(long)]
    channels: Option<u16>,
    /// Play for this many seconds, fade out, then exit.
    #[arg(long)]
    duration: Option<f64>,
    /// Output level in [0, 1].
    #[arg(long)]
    volume: Option<f32>,
    /// JSON file with engine settings; unspecified fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

fn list_output_devices() -> Result<(), Box<dyn Error>> {
    let host = cpal::default_host();
    println!("Available output devices:");
    for dev in host.output_devices()? {
        println!("- {}", dev.name()?);
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    let config = serde_json::from_str(&text).map_err(|e| format!("parsing {}: {e}", path.display()))?;
    Ok(config)
}

/// `--duration` as a `Duration`; rejects negative, non-finite and overflowing values.
fn play_time(secs: f64) -> Result<Duration, Box<dyn Error>> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("--duration must be a finite, non-negative number of seconds, got {secs}").into());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("--duration {secs}: {e}").into())
}

fn pick_device(name: Option<&str>) -> Result<cpal::Device, Box<dyn Error>> {
    let host = cpal::default_host();
    if let Some(name) = name {
        for d in host.output_devices()? {
            if d.name()? == name {
                return Ok(d);
            }
        }
        return Err(format!("requested device not found: {name}").into());
    }
    host.default_output_device().ok_or_else(|| "no default output device".into())
}

fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig, Box<dyn Error>> {
    if req_sr.is_none() && req_ch.is_none() {
        return Ok(device.default_output_config()?);
    }

    // Closest range: sample rate mismatch dominates channel mismatch.
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;
        let ch_pen = req_ch.map_or(0, |c| u64::from(range.channels().abs_diff(c)));
        let sr_pen = match req_sr {
            Some(sr) if !(sr_min..=sr_max).contains(&sr) => u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))),
            _ => 0,
        };
        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }
    let (_, range) = best.ok_or("no supported output configs")?;

    let sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };
    Ok(range.with_sample_rate(sr))
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut renderer: Renderer,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, Box<dyn Error>>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = cfg.channels as usize;
    let mut scratch: Vec<f32> = Vec::with_capacity(8192);

    // ~1 second peak meter
    let meter_interval = cfg.sample_rate.0.max(1) as usize;
    let mut meter_count = 0usize;
    let mut meter_peak = 0.0f32;

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            scratch.resize(output.len(), 0.0);
            renderer.process_interleaved(&mut scratch, channels);
            for (o, s) in output.iter_mut().zip(scratch.iter()) {
                *o = T::from_sample(s.clamp(-1.0, 1.0));
            }

            for frame in scratch.chunks(channels.max(1)) {
                meter_peak = meter_peak.max(frame[0].abs());
                meter_count += 1;
                if meter_count >= meter_interval {
                    tracing::trace!(peak = meter_peak, "output meter");
                    meter_peak = 0.0;
                    meter_count = 0;
                }
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    if args.list_devices {
        return list_output_devices();
    }

    let config = load_config(args.config.as_ref())?;
    let play_for = args.duration.map(play_time).transpose()?;
    let device = pick_device(args.device.as_deref())?;
    let sup_cfg = choose_config(&device, args.sample_rate, args.channels)?;
    let sample_format = sup_cfg.sample_format();
    let mut cfg = sup_cfg.config();
    if let Some(ch) = args.channels {
        cfg.channels = ch;
    }

    let (ctx, renderer) = lobby_engine::channel(cfg.sample_rate.0 as f32, DEFAULT_CAPACITY);
    let mut engine = MusicEngine::new(ctx, config)?;
    if let Some(v) = args.volume {
        engine.set_volume(v);
    }

    tracing::info!(device = %device.name()?, ?cfg, ?sample_format, volume = engine.volume(), "opening output");

    let err_fn = |e: cpal::StreamError| tracing::error!(%e, "stream error");
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, renderer, err_fn)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, renderer, err_fn)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, renderer, err_fn)?,
        other => return Err(format!("unsupported device sample format: {other:?}").into()),
    };
    stream.play()?;

    let started = Instant::now();
    let stop_at = play_for.map(|d| started.checked_add(d).ok_or("--duration is too long")).transpose()?;
    engine.start(started);
    match play_for {
        Some(d) => tracing::info!(secs = d.as_secs_f64(), "playing; will fade out"),
        None => tracing::info!("playing; press Ctrl+C to quit"),
    }

    loop {
        let now = Instant::now();
        engine.poll(now);

        if let Some(at) = stop_at {
            match engine.state() {
                TransportState::Starting | TransportState::Running if now >= at => engine.stop(),
                TransportState::Idle => break,
                _ => {}
            }
        }

        let wake = engine.next_deadline().unwrap_or(now + MAX_SLEEP).min(now + MAX_SLEEP);
        std::thread::sleep(wake.saturating_duration_since(Instant::now()));
    }

    let _ctx = engine.destroy();
    drop(stream);
    Ok(())
}
