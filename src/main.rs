use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pose_coach::camera::BlankSource;
use pose_coach::config::Config;
use pose_coach::error::PoseError;
use pose_coach::pipeline::Pipeline;
use pose_coach::pose::{DetectionAdapter, ReplayBackend};
use pose_coach::scoring::{Recognition, Recognizer};
use pose_coach::template::TemplateCatalog;
use pose_coach::tracker::{ScoreSnapshot, ScoringSession};

const CONFIG_PATH: &str = "config.toml";
const DEFAULT_TEMPLATE: &str = "mountain";
/// 記録の座標系（ピクセル）
const REPLAY_WIDTH: u32 = 640;
const REPLAY_HEIGHT: u32 = 480;

fn usage(catalog: &TemplateCatalog) -> String {
    let keys: Vec<String> = catalog.list().into_iter().map(|s| s.key).collect();
    format!(
        "Usage: pose-coach <replay.json> [template]\n  templates: {}",
        keys.join(", ")
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("pose-coach ({})", env!("POSE_COACH_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH);
    let catalog = TemplateCatalog::from_config(&config).context("Failed to build template catalog")?;

    let args: Vec<String> = std::env::args().collect();
    let Some(recording) = args.get(1) else {
        bail!("{}", usage(&catalog));
    };
    let template_key = args.get(2).map(String::as_str).unwrap_or(DEFAULT_TEMPLATE);
    if catalog.lookup(template_key).is_none() {
        bail!("Unknown template: {}\n{}", template_key, usage(&catalog));
    }

    let frames = ReplayBackend::load(recording)?;
    info!("{}: {} recorded frames", recording, frames.len());

    let adapter = DetectionAdapter::new(
        vec![ReplayBackend::probe(frames, 0)],
        config.detection.clone(),
        config.scoring.min_confidence,
    );
    for backend in adapter.probe_backends().await {
        info!("backend available: {} ({:?})", backend.name, backend.kind);
    }

    let session = ScoringSession::new(config.scoring.clone());
    let source = BlankSource::new(REPLAY_WIDTH, REPLAY_HEIGHT);
    let mut pipeline = Pipeline::new(adapter, session, source, config.detection.clone());
    pipeline.select_template(&catalog, template_key)?;
    let backend = pipeline.initialize().await?;
    info!("using {}", backend.name);

    let stop = pipeline.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let (tx, mut rx) = mpsc::channel::<ScoreSnapshot>(16);
    let reporter = tokio::spawn(async move {
        let mut last = None;
        while let Some(snapshot) = rx.recv().await {
            info!(
                "score {:.1} (acc {:.1} stab {:.1} hold {:.1}s reps {})",
                snapshot.score,
                snapshot.accuracy,
                snapshot.stability,
                snapshot.hold_seconds,
                snapshot.repetitions
            );
            last = Some(snapshot);
        }
        last
    });

    match pipeline.run(tx).await {
        Ok(()) => info!("stopped"),
        // 記録を使い切った
        Err(PoseError::NoBackend) => info!("recording finished"),
        Err(e) => warn!("pipeline ended: {}", e),
    }
    let last = reporter.await?;

    if let Some(frame) = pipeline.last_landmarks() {
        let recognizer = Recognizer::new(config.recognition.clone(), config.scoring.min_confidence);
        match recognizer.recognize(frame) {
            Recognition::Match { stance, confidence } => {
                info!("last frame looks like {:?} ({:.2})", stance, confidence)
            }
            Recognition::NoConfidentMatch { best } => {
                info!("no confident stance (best {:?} {:.2})", best.stance, best.confidence)
            }
        }
    }

    match last {
        Some(snapshot) => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            println!("best score: {:.1}", snapshot.best_score);
        }
        None => println!("no frames scored"),
    }
    Ok(())
}
