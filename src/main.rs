// Command-line runner for the `wound_risk` library.
//
//     wound_risk [--symptoms pain,drainage] <image>...
//
// Settings come from `wound_risk.{yaml,toml,json}` and `WOUND_RISK_*`
// variables. Results are printed as a JSON array, one entry per image.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use wound_risk::settings::{Settings, init_logging};
use wound_risk::{RiskResult, SymptomInputs, WorkerPool, load_model};

const USAGE: &str = "usage: wound_risk [--symptoms a,b,...] <image>...";

#[derive(Debug, Default, PartialEq)]
struct Arguments {
    symptoms: Option<SymptomInputs>,
    images: Vec<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Arguments> {
    let mut parsed = Arguments::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let list = match arg.strip_prefix("--symptoms") {
            Some("") => args.next().context("--symptoms needs a value")?,
            Some(rest) if rest.starts_with('=') => rest[1..].to_string(),
            Some(_) | None if arg.starts_with("--") => bail!("Unknown option '{arg}'\n{USAGE}"),
            _ => {
                parsed.images.push(PathBuf::from(&arg));
                continue;
            }
        };
        parsed.symptoms = Some(list.parse()?);
    }
    Ok(parsed)
}

#[derive(Serialize)]
struct ImageReport<'a> {
    image: &'a PathBuf,
    #[serde(flatten)]
    result: RiskResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    init_logging(&settings.log_level);

    let arguments = parse_args(std::env::args().skip(1))?;
    if arguments.images.is_empty() {
        bail!(USAGE);
    }

    let model = load_model(&settings)?;
    let pool = WorkerPool::new(model, settings.worker_count());

    let mut jobs = Vec::with_capacity(arguments.images.len());
    for path in &arguments.images {
        let image = image::open(path)
            .with_context(|| format!("Failed to decode {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        if width.min(height) < settings.min_image_side {
            bail!(
                "{} is {width}x{height}; the shorter side must be at least {} pixels",
                path.display(),
                settings.min_image_side
            );
        }
        jobs.push((image, arguments.symptoms));
    }

    info!(images = jobs.len(), workers = pool.size(), "Assessing images");
    let results = pool.assess_batch(jobs).await;

    let mut reports = Vec::with_capacity(results.len());
    for (path, result) in arguments.images.iter().zip(results) {
        let result = result.with_context(|| format!("Failed to assess {}", path.display()))?;
        info!(
            image = %path.display(),
            risk_score = result.risk_score,
            risk_level = %result.risk_level,
            "Assessed image"
        );
        reports.push(ImageReport {
            image: path,
            result,
        });
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);

    pool.shutdown().await;
    Ok(())
}
