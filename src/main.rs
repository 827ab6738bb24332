use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use uv_atlas::config::{CliArgs, RunConfig};
use uv_atlas::pipeline::Pipeline;

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Init tracing
    let filter = if args.verbose {
        EnvFilter::new("uv_atlas=debug")
    } else {
        EnvFilter::new("uv_atlas=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config: RunConfig = args.into();

    // Configure rayon thread pool
    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure rayon thread pool")?;
    }

    match Pipeline::run(&config) {
        Ok(result) => {
            println!(
                "Done: {} meshes ({} skipped), {} charts on {} page(s) of {}x{} in {:.2}s",
                result.accepted,
                result.rejected,
                result.chart_count,
                result.page_count,
                result.width,
                result.height,
                result.duration.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            error!(%e, "Atlas run failed");
            Err(anyhow::anyhow!(e)).context("uv-atlas run failed")
        }
    }
}
