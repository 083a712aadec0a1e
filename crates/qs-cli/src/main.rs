//! CLI entry point: load a JSON bar file, evaluate the built-in demo
//! strategy, and serve the chart.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qs_core::{ingest, ChartData, Engine, IngestError, LineConfig, PlotConfig};

#[derive(Parser)]
#[command(
    name = "quantscript",
    version,
    about = "Bar-by-bar TA engine with an HTTP chart surface"
)]
struct Cli {
    /// Port for the chart server
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Path to the JSON bar file
    #[arg(long, default_value = "sample-data.json")]
    data: PathBuf,

    /// Directory with the static chart front-end
    #[arg(long, default_value = "chart/dist")]
    static_dir: PathBuf,
}

/// SMA on the candle pane, RSI on its own pane with 30/50/70 level lines.
fn demo_strategy(eng: &Engine) {
    let close = eng.close();
    let rsi = eng.rsi(&close, 14.0, Some("rsi")).get();
    let sma = eng.sma(&close, 14.0).get();

    eng.plot(
        sma,
        Some(PlotConfig {
            location: "candle_pane".to_owned(),
            ..Default::default()
        }),
        None,
    );
    eng.plot(rsi, None, Some("rsi"));

    for (width, level) in [(1.0, 30.0), (0.5, 50.0), (1.0, 70.0)] {
        eng.hline(
            level,
            Some(LineConfig {
                color: "#787B80".to_owned(),
                width,
                dashed: 5.0,
                location: "rsi".to_owned(),
                ..Default::default()
            }),
        );
    }
}

fn build_chart(data: &Path) -> Result<ChartData, IngestError> {
    let bars = ingest::bars_from_path(data)?;
    let engine = Engine::new();
    engine.add_bars(&bars);
    engine.run(demo_strategy);
    Ok(engine.chart_data())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let chart = match build_chart(&cli.data) {
        Ok(chart) => chart,
        Err(e) => {
            tracing::error!("failed to build chart: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(bars = chart.bars.len(), "chart ready");

    if let Err(e) = qs_server::serve(chart, cli.port, cli.static_dir).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
