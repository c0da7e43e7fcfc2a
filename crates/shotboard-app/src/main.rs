//! Main application entry point.

use clap::Parser;
use shotboard_app::{App, AppError, CaptureRequest, Cli, Command};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let app = App::new(cli.app_config()?)?;

    match cli.command {
        Command::Capture {
            image,
            title,
            url,
            project,
            canvas,
        } => {
            let outcome = app
                .capture(CaptureRequest {
                    image,
                    page_title: title,
                    page_url: url,
                    project,
                    canvas,
                })
                .await?;
            println!("{}", outcome.path);
            match serde_json::to_string_pretty(&outcome.screenshot) {
                Ok(json) => println!("{}", json),
                Err(e) => log::warn!("Failed to render record: {}", e),
            }
        }
        Command::Scan => {
            let outcome = app.scan().await?;
            println!(
                "{} screenshot(s) added, {} project(s) created",
                outcome.report.screenshots_added, outcome.report.projects_created
            );
        }
        Command::NewProject => println!("{}", app.new_project().await?),
        Command::Open { project } => {
            let canvas = app.open(&project).await?;
            println!("{} {}", project, canvas);
        }
        Command::Projects => {
            for id in app.projects().await? {
                println!("{}", id);
            }
        }
        Command::DeleteCanvas {
            project,
            canvas,
            orphans,
        } => {
            let removed = app.delete_canvas(&project, &canvas, orphans.into()).await?;
            println!(
                "Deleted {} ({} screenshot(s) removed, {} reassigned)",
                removed.canvas.name,
                removed.removed.len(),
                removed.reassigned
            );
        }
        Command::Watch { project, canvas } => app.watch(project, canvas).await?,
    }
    Ok(())
}
