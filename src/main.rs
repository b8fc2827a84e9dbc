use anyhow::Context;
use clap::Parser;
use screen_ocr_prep::config::{Args, Config};
use screen_ocr_prep::preprocessing::{raster, Pipeline};
use screen_ocr_prep::tools::CommandRunner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from(args);

    tracing::info!("Starting screen-ocr-prep v{}", env!("CARGO_PKG_VERSION"));

    let profile = config.profile().context("Failed to read parameters")?;
    let original = raster::load(&config.input)
        .with_context(|| format!("Failed to load {}", config.input.display()))?;
    tracing::info!(
        "Loaded {} ({}x{})",
        config.input.display(),
        original.width(),
        original.height()
    );

    let runner = match &config.work_dir {
        Some(dir) => CommandRunner::with_work_dir(config.programs.clone(), dir.clone()),
        None => CommandRunner::new(config.programs.clone()),
    }
    .context("Failed to prepare the tool work directory")?
    .quantum_range_override(config.quantum_range);

    let pipeline = Pipeline::new(profile.parameters(), runner);
    let result = pipeline.process(&original).context("Preprocessing failed")?;

    raster::save(&result.image, &config.output)
        .with_context(|| format!("Failed to write {}", config.output.display()))?;
    tracing::info!("Wrote {}", config.output.display());

    if let Some(path) = &config.save_profile {
        profile
            .save(path)
            .with_context(|| format!("Failed to save profile {}", path.display()))?;
        tracing::info!("Saved profile {}", path.display());
    }

    if config.report {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
