use std::time::Duration;

use crate::app::{AppContext, LectioError, Result};
use crate::domain::{canon, ChapterContent, ChapterRef, ProgressStats, Testament};
use crate::reader::NavigationOutcome;

pub async fn read_chapter(
    ctx: &AppContext,
    book: &str,
    chapter: u16,
    verse: Option<u16>,
    version: Option<&str>,
) -> Result<()> {
    if let Some(id) = version {
        let language = &ctx.config.provider.language;
        let descriptor = ctx
            .catalog
            .find_version(language, id)
            .await
            .ok_or_else(|| LectioError::Other(format!("Unknown version: {}", id)))?;
        ctx.reader.set_current_version(descriptor).await?;
    }

    let mut target = ChapterRef::new(book, chapter);
    target.verse = verse;
    let outcome = ctx.reader.navigate_to_chapter(target).await?;
    print_outcome(ctx, &outcome);
    Ok(())
}

pub async fn next_chapter(ctx: &AppContext) -> Result<()> {
    if ctx.resume().await?.is_none() {
        println!("Nothing read yet; start with `lectio read GEN 1`");
        return Ok(());
    }
    let outcome = ctx.reader.go_to_next_chapter().await?;
    print_outcome(ctx, &outcome);
    Ok(())
}

pub async fn previous_chapter(ctx: &AppContext) -> Result<()> {
    if ctx.resume().await?.is_none() {
        println!("Nothing read yet; start with `lectio read GEN 1`");
        return Ok(());
    }
    let outcome = ctx.reader.go_to_previous_chapter().await?;
    print_outcome(ctx, &outcome);
    Ok(())
}

pub async fn list_versions(ctx: &AppContext, language: Option<&str>) -> Result<()> {
    let language = language.unwrap_or(ctx.config.provider.language.as_str());
    let current = ctx.reader.current_version();

    for v in ctx.catalog.list_versions(language).await {
        let marker = match (v.id == current.id, v.is_default) {
            (true, true) => "*D",
            (true, false) => "* ",
            (false, true) => " D",
            (false, false) => "  ",
        };
        println!("{} {:<12} {:<8} {}", marker, v.id, v.abbreviation, v.name);
    }
    Ok(())
}

pub async fn set_default_version(ctx: &AppContext, id: &str) -> Result<()> {
    let language = &ctx.config.provider.language;
    if ctx.catalog.find_version(language, id).await.is_none() {
        println!("Warning: {} is not listed for language {}", id, language);
    }
    ctx.catalog.set_default_version(id)?;
    println!("Default version set to {}", id);
    Ok(())
}

pub async fn search(ctx: &AppContext, query: &str, limit: Option<usize>) -> Result<()> {
    let limit = limit.unwrap_or(ctx.config.search.max_results);
    let results = ctx.search.search_verses(query, limit).await?;

    if results.is_empty() {
        println!("No results");
        return Ok(());
    }

    for r in &results {
        println!("{:<24} [{}] {}", r.display_reference(), r.match_kind.label(), r.text);
    }
    println!("\n{} results", results.len());
    Ok(())
}

pub fn show_history(ctx: &AppContext, clear: bool) -> Result<()> {
    if clear {
        ctx.search.clear_history();
        println!("Search history cleared");
        return Ok(());
    }

    let history = ctx.search.history();
    if history.is_empty() {
        println!("No searches yet");
    }
    for (i, query) in history.iter().enumerate() {
        println!("{:>2}. {}", i + 1, query);
    }
    Ok(())
}

pub fn show_stats(ctx: &AppContext) -> Result<()> {
    let stats = ctx.tracker.snapshot();
    for line in stats_lines(&stats) {
        println!("{}", line);
    }
    Ok(())
}

pub fn list_books(ctx: &AppContext) -> Result<()> {
    let stats = ctx.tracker.snapshot();

    for testament in [Testament::Old, Testament::New] {
        let label = match testament {
            Testament::Old => "Old Testament",
            Testament::New => "New Testament",
        };
        println!("{}", label);
        for book in canon::books(testament) {
            let read = (1..=book.chapters)
                .filter(|c| stats.is_chapter_read(book.code, *c))
                .count();
            println!(
                "  {} {:<18} {:>3}/{:<3}",
                book.code, book.name, read, book.chapters
            );
        }
    }
    Ok(())
}

/// Summary lines shared by `lectio stats` and the TUI stats panel.
pub fn stats_lines(stats: &ProgressStats) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Progress:   {:.1}% ({} of {} chapters)",
            stats.progress_percentage,
            stats.chapters_read.len(),
            canon::total_chapters()
        ),
        format!("Books read: {}", stats.books_read),
        format!("Verses:     {}", stats.verses_read),
        format!("Streak:     {} days", stats.consecutive_days),
        format!("Time:       {}", format_duration(stats.total_reading_time())),
    ];
    if stats.meditations_count > 0 || stats.learning_modules_completed > 0 {
        lines.push(format!(
            "Meditations: {}  Modules: {}",
            stats.meditations_count, stats.learning_modules_completed
        ));
    }
    if let Some(date) = stats.last_active_date {
        lines.push(format!("Last read:  {}", date));
    }
    lines
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, (secs % 3600) / 60) {
        (0, 0) => format!("{}s", secs),
        (0, m) => format!("{}m", m),
        (h, m) => format!("{}h {:02}m", h, m),
    }
}

fn print_outcome(ctx: &AppContext, outcome: &NavigationOutcome) {
    match outcome {
        NavigationOutcome::Committed(_) | NavigationOutcome::Unchanged => {
            let state = ctx.reader.snapshot();
            if let Some(content) = &state.content {
                println!("{}\n", state.title());
                print_chapter(content, state.position.as_ref().and_then(|p| p.verse));
            }
        }
        NavigationOutcome::AtBoundary => println!("No more chapters in that direction"),
        NavigationOutcome::Superseded => {}
    }
}

fn print_chapter(content: &ChapterContent, marked: Option<u16>) {
    for verse in &content.verses {
        let marker = if Some(verse.number) == marked { ">" } else { " " };
        println!("{}{:>3} {}", marker, verse.number, verse.text);
    }
}
