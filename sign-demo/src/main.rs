//! # Saorsa Sign Demo
//!
//! Replays a field placement script against a document and prints the result.

use clap::Parser;
use sign_demo::{CliArgs, DemoConfig, Report};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sign_demo=info,sign_viewer=info,sign_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    let config = DemoConfig::from(args);

    let viewer = config.viewer_config().await?;
    let commands = config.commands().await?;
    let document = config.document_source().await?;

    tracing::info!(
        "Replaying {} commands against {} in {} mode",
        commands.len(),
        config.document.display(),
        viewer.default_view_mode
    );

    let report = sign_demo::run(&viewer, document, &commands).await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if !report.failures.is_empty() {
        tracing::warn!("{} steps failed", report.failures.len());
    }
    Ok(())
}

fn print_summary(report: &Report) {
    println!(
        "Page {} of {} at {:.0}% ({} mode)",
        report.current_page,
        report.total_pages,
        report.scale * 100.0,
        report.view_mode
    );
    println!("{} fields:", report.fields.len());
    for field in &report.fields {
        let rect = field.rect;
        println!(
            "  {} on page {}: ({:.1}, {:.1}) {:.1}x{:.1}",
            field.id,
            field.page_index + 1,
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
    }
    println!("{} events published", report.events.len());
    for failure in &report.failures {
        println!("failed: {failure}");
    }
    for job in &report.printed {
        println!("printed {} pages with {} fields", job.pages, job.fields);
    }
}
