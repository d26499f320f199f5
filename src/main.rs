use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lectio::app::AppContext;
use lectio::cli::{commands, Cli, Commands};
use lectio::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = Arc::new(AppContext::new(config, cli.db.clone()).await?);

    let result = match cli.command {
        Commands::Read {
            book,
            chapter,
            verse,
            version,
        } => commands::read_chapter(&ctx, &book, chapter, verse, version.as_deref()).await,
        Commands::Next => commands::next_chapter(&ctx).await,
        Commands::Prev => commands::previous_chapter(&ctx).await,
        Commands::Versions { language } => {
            commands::list_versions(&ctx, language.as_deref()).await
        }
        Commands::DefaultVersion { id } => commands::set_default_version(&ctx, &id).await,
        Commands::Search { query, limit } => commands::search(&ctx, &query, limit).await,
        Commands::History { clear } => commands::show_history(&ctx, clear),
        Commands::Stats => commands::show_stats(&ctx),
        Commands::Books => commands::list_books(&ctx),
        Commands::Tui => lectio::tui::run(ctx.clone()).await,
    };

    // Write out the reading session before exiting, even on error.
    ctx.shutdown().await;
    result?;
    Ok(())
}
