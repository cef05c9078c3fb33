//! Headless demo: drives the engine over a generated grid with scripted
//! gestures and a synthetic image source, then writes the last frame as a PNG.

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec2;
use image::{ImageFormat, Rgba as Pixel, RgbaImage};
use panzoom_grid::grid::cells_from_json;
use panzoom_grid::{
    Engine, EngineConfig, FetchError, FetchResponse, GridCell, GridDataProvider, ImageFetcher, InputEvent,
    RasterSurface, RecordingSurface, Rgba, UiChrome,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "panzoom-grid", about = "Headless pan/zoom grid engine demo")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Number of frames to run
    #[arg(long, default_value_t = 240)]
    frames: u64,

    /// Engine config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of cell records, used instead of the generated grid
    #[arg(long)]
    cells: Option<PathBuf>,

    /// Seed for the generated grid
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Fraction of synthetic fetches that fail
    #[arg(long, default_value_t = 0.1)]
    failure_rate: f64,

    /// Simulated fetch latency in milliseconds
    #[arg(long, default_value_t = 30)]
    latency_ms: u64,

    /// Start centered on this cell, as `x,y`
    #[arg(long, value_parser = parse_cell)]
    goto: Option<(i64, i64)>,

    /// Where to write the final frame
    #[arg(short, long, default_value = "frame.png")]
    output: PathBuf,

    /// Serve puffin profiling data while running
    #[arg(long)]
    profile: bool,
}

fn parse_cell(s: &str) -> Result<(i64, i64), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected x,y, got {s:?}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y: {e}"))?;
    Ok((x, y))
}

/// Deterministic pseudo-random grid content derived from cell coordinates
struct DemoGrid {
    seed: u64,
}

const TITLES: &[&str] = &["Harbor", "Ridge", "Meadow", "Canyon", "Lagoon", "Summit", "Grove", "Dune"];
const SUBTITLES: &[&str] = &["morning", "dusk", "overcast", "clear", "late autumn"];

impl GridDataProvider for DemoGrid {
    fn get(&self, x: i64, y: i64) -> Option<GridCell> {
        let key = self.seed ^ (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        let mut rng = StdRng::seed_from_u64(key);
        if rng.gen_bool(0.3) {
            return None;
        }

        let mut cell = GridCell::new(x, y);
        if rng.gen_bool(0.6) {
            cell.image = Some(format!("https://demo.test/photo/{}", rng.gen_range(0..500)));
        } else {
            cell.background = Some(Rgba::rgb(rng.gen(), rng.gen(), rng.gen()));
        }
        if rng.gen_bool(0.5) {
            cell.title = Some(TITLES[rng.gen_range(0..TITLES.len())].to_string());
            if rng.gen_bool(0.5) {
                cell.subtitle = Some(SUBTITLES[rng.gen_range(0..SUBTITLES.len())].to_string());
            }
        }
        Some(cell)
    }
}

/// Generates PNGs locally in place of a network image service.
///
/// Base URLs `.../photo/{n}` answer with a tiny image and a source id header;
/// tier URLs `.../id/{id}/{size}` answer with a `size`-pixel square.
struct SyntheticFetcher {
    header: String,
    failure_rate: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SyntheticFetcher {
    fn should_fail(&self) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(self.failure_rate.clamp(0.0, 1.0)),
            Err(_) => false,
        }
    }

    fn render(id: u64, size: u32) -> Result<Vec<u8>, FetchError> {
        let size = size.max(1);
        let hue = (id * 47 % 256) as u8;
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let fx = (x * 255 / size) as u8;
            let fy = (y * 255 / size) as u8;
            Pixel([hue, fx, fy, 255])
        });
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

impl ImageFetcher for SyntheticFetcher {
    fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        thread::sleep(self.latency);
        if self.should_fail() {
            return Err(FetchError::Network(format!("synthetic failure for {url}")));
        }

        let path = url.split('?').next().unwrap_or(url);
        let segments: Vec<&str> = path.rsplit('/').take(3).collect();
        match segments.as_slice() {
            [size, id, "id"] => {
                let size: u32 = size.parse().map_err(|_| FetchError::Status(400))?;
                let id: u64 = id.parse().map_err(|_| FetchError::Status(404))?;
                Ok(FetchResponse::new(Self::render(id, size)?))
            }
            [n, "photo", ..] => {
                let id: u64 = n.parse().map_err(|_| FetchError::Status(404))?;
                Ok(FetchResponse::new(Self::render(id, 4)?).with_header(&self.header, id.to_string()))
            }
            _ => Err(FetchError::Status(404)),
        }
    }
}

/// Logs the camera cell whenever it changes
#[derive(Default)]
struct LogChrome {
    cell: Option<(i64, i64)>,
}

impl UiChrome for LogChrome {
    fn report_cell(&mut self, x: i64, y: i64) {
        if self.cell != Some((x, y)) {
            debug!("camera over {x},{y}");
            self.cell = Some((x, y));
        }
    }

    fn report_cache(&mut self, occupancy: &str) {
        debug!("cache {occupancy}");
    }
}

/// Input injected on a given frame
fn scripted_input(frame: u64, viewport: DVec2) -> Vec<InputEvent> {
    let center = viewport / 2.0;
    match frame {
        // Drag left and let go: fling to the right
        10 => vec![InputEvent::PointerDown { pos: center }],
        11..=20 => vec![InputEvent::PointerMove {
            pos: center - DVec2::new(24.0 * (frame - 10) as f64, 6.0 * (frame - 10) as f64),
        }],
        21 => vec![InputEvent::PointerUp],
        // Wheel zoom out
        90..=110 => vec![InputEvent::Wheel {
            delta: DVec2::new(0.0, 4.0),
            modifier: true,
        }],
        // Two-finger pinch in
        150 => vec![InputEvent::TouchStart {
            touches: vec![center - DVec2::new(60.0, 0.0), center + DVec2::new(60.0, 0.0)],
        }],
        151..=165 => {
            let spread = 60.0 + 8.0 * (frame - 150) as f64;
            vec![InputEvent::TouchMove {
                touches: vec![center - DVec2::new(spread, 0.0), center + DVec2::new(spread, 0.0)],
            }]
        }
        166 => vec![InputEvent::TouchEnd { touches: Vec::new() }],
        _ => Vec::new(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let _profiler = if cli.profile {
        puffin::set_scopes_on(true);
        let addr = format!("0.0.0.0:{}", puffin_http::DEFAULT_PORT);
        info!("serving profile data on {addr}");
        Some(puffin_http::Server::new(&addr)?)
    } else {
        None
    };

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let provider: Box<dyn GridDataProvider> = match &cli.cells {
        Some(path) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let cells: HashMap<(i64, i64), GridCell> = cells_from_json(&json)?;
            info!("loaded {} cells from {}", cells.len(), path.display());
            Box::new(cells)
        }
        None => Box::new(DemoGrid { seed: cli.seed }),
    };

    let fetcher = Arc::new(SyntheticFetcher {
        header: config.source_id_header.clone(),
        failure_rate: cli.failure_rate,
        latency: Duration::from_millis(cli.latency_ms),
        rng: Mutex::new(StdRng::seed_from_u64(cli.seed)),
    });

    let (width, height) = (f64::from(cli.width), f64::from(cli.height));
    let mut engine = Engine::new(config, width, height, fetcher)?;
    if let Some((x, y)) = cli.goto {
        engine.recenter(x, y);
    }

    let mut preview = RecordingSurface::new(width, height);
    let mut raster = RasterSurface::new(cli.width, cli.height).context("viewport must not be empty")?;
    let mut chrome = LogChrome::default();
    let viewport = DVec2::new(width, height);

    for frame in 0..cli.frames {
        puffin::GlobalProfiler::lock().new_frame();

        let now = Instant::now();
        for event in scripted_input(frame, viewport) {
            engine.handle_input(event, now);
        }

        let report = if frame + 1 == cli.frames {
            engine.frame(now, &mut raster, provider.as_ref(), &mut chrome)
        } else {
            preview.clear_commands();
            engine.frame(now, &mut preview, provider.as_ref(), &mut chrome)
        };
        if report.pump.failed > 0 {
            warn!("frame {frame}: {} fetches failed, retrying", report.pump.failed);
        }

        let wake = engine.scheduler().next_wakeup(Instant::now());
        if let Some(wait) = wake.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    raster
        .save_png(&cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;

    let camera = engine.camera();
    println!(
        "camera at ({:.2}, {:.2}) scale {:.1}, cache {}, {} fetches issued, frame written to {}",
        camera.position.x,
        camera.position.y,
        camera.scale(),
        engine.cache().occupancy(),
        engine.cache().pool().submitted(),
        cli.output.display()
    );
    Ok(())
}
