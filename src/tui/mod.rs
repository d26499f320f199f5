pub mod app;
pub mod event;
pub mod layout;

use std::future::Future;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyModifiers, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::app::{AppContext, LectioError, Result};
use crate::domain::{ChapterRef, VersionDescriptor};
use crate::reader::{NavigationOutcome, ReaderState};

use self::app::{Mode, PointerDrag, TuiApp, PAGE_SIZE};
use self::event::{Action, AppEvent, EventHandler};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Work finished off the event loop.
enum Background {
    Resumed(Result<Option<NavigationOutcome>>),
    Navigation(Result<NavigationOutcome>),
    VersionSwitch(VersionDescriptor, Result<NavigationOutcome>),
    Versions(Vec<VersionDescriptor>),
    SearchDone,
}

type Tasks = mpsc::UnboundedSender<Background>;

/// Run the TUI until the user quits. The caller shuts the context down.
pub async fn run(ctx: Arc<AppContext>) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, ctx).await;
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(terminal: &mut Tui, ctx: Arc<AppContext>) -> Result<()> {
    let mut reader_rx = ctx.reader.subscribe();
    let mut tui_app = TuiApp::new(ctx.reader.snapshot(), ctx.tracker.snapshot());
    let event_handler = EventHandler::new(Duration::from_millis(100));
    let (tasks, mut done) = mpsc::unbounded_channel();

    // Resume where the last session stopped; a failure shows in the status bar.
    let resume_ctx = ctx.clone();
    spawn_task(&tasks, async move { Background::Resumed(resume_ctx.resume().await) });

    loop {
        while let Ok(finished) = done.try_recv() {
            apply_background(&mut tui_app, &ctx, finished);
        }
        sync_reader(&mut tui_app, &mut reader_rx, &ctx);
        let colors = &ctx.config.colors;
        terminal.draw(|frame| layout::render(frame, &mut tui_app, colors))?;

        match event_handler.next()? {
            AppEvent::Key(key) => {
                if tui_app.mode == Mode::Search && tui_app.search_editing {
                    handle_search_input(&mut tui_app, &ctx, &tasks, key);
                    continue;
                }
                let action = ctx.config.keybindings.get_action(&key);
                handle_action(&mut tui_app, &ctx, &tasks, action);
            }
            AppEvent::Mouse(mouse) => handle_mouse(&mut tui_app, &ctx, &tasks, mouse),
            AppEvent::Tick => {
                ctx.reader.clear_finished_highlight(Instant::now());
            }
        }

        if tui_app.should_quit {
            break;
        }
    }

    Ok(())
}

fn spawn_task<F>(tasks: &Tasks, task: F)
where
    F: Future<Output = Background> + Send + 'static,
{
    let tasks = tasks.clone();
    tokio::spawn(async move {
        let _ = tasks.send(task.await);
    });
}

fn spawn_navigation<F>(tasks: &Tasks, navigation: F)
where
    F: Future<Output = Result<NavigationOutcome>> + Send + 'static,
{
    spawn_task(tasks, async move { Background::Navigation(navigation.await) });
}

fn apply_background(tui_app: &mut TuiApp, ctx: &AppContext, finished: Background) {
    match finished {
        Background::Resumed(Ok(None)) => {
            tui_app.set_status("Welcome. Press n to start at Genesis 1".to_string())
        }
        Background::Resumed(result) => navigation_result(
            tui_app,
            result.map(|o| o.unwrap_or(NavigationOutcome::Unchanged)),
        ),
        Background::Navigation(result) => navigation_result(tui_app, result),
        Background::VersionSwitch(version, result) => match result {
            Ok(_) => tui_app.set_status(format!("Reading {}", version.display_name())),
            Err(e) => report(tui_app, e),
        },
        Background::Versions(versions) => {
            tui_app.clear_status();
            tui_app.open_versions(versions);
        }
        Background::SearchDone => {
            tui_app.history = ctx.search.history();
            tui_app.set_search(ctx.search.state());
        }
    }
}

fn sync_reader(tui_app: &mut TuiApp, rx: &mut watch::Receiver<ReaderState>, ctx: &AppContext) {
    if rx.has_changed().unwrap_or(false) {
        let state = rx.borrow_and_update().clone();
        tui_app.update_reader(state);
        tui_app.stats = ctx.tracker.snapshot();
    }
}

fn handle_action(tui_app: &mut TuiApp, ctx: &Arc<AppContext>, tasks: &Tasks, action: Action) {
    match (tui_app.mode, action) {
        (_, Action::Quit) => tui_app.should_quit = true,

        (Mode::Reading, Action::NextChapter) => {
            let reader = ctx.reader.clone();
            spawn_navigation(tasks, async move {
                if reader.position().is_none() {
                    reader.navigate_to_chapter(ChapterRef::new("GEN", 1)).await
                } else {
                    reader.go_to_next_chapter().await
                }
            });
        }
        (Mode::Reading, Action::PrevChapter) => {
            let reader = ctx.reader.clone();
            spawn_navigation(tasks, async move { reader.go_to_previous_chapter().await });
        }
        (Mode::Reading, Action::ScrollDown) => tui_app.scroll_down(1),
        (Mode::Reading, Action::ScrollUp) => tui_app.scroll_up(1),
        (Mode::Reading, Action::PageDown) => tui_app.scroll_down(PAGE_SIZE),
        (Mode::Reading, Action::PageUp) => tui_app.scroll_up(PAGE_SIZE),
        (Mode::Reading, Action::Retry) => {
            let reader = ctx.reader.clone();
            spawn_navigation(tasks, async move { reader.retry().await });
        }
        (Mode::Reading, Action::Search) => {
            tui_app.clear_status();
            tui_app.open_search(ctx.search.history());
        }
        (Mode::Reading, Action::Versions) => {
            tui_app.set_status("Loading versions...".to_string());
            let catalog = ctx.catalog.clone();
            let language = ctx.config.provider.language.clone();
            spawn_task(tasks, async move {
                Background::Versions(catalog.list_versions(&language).await)
            });
        }
        (Mode::Reading, Action::Stats) => {
            tui_app.stats = ctx.tracker.snapshot();
            tui_app.mode = Mode::Stats;
        }

        (Mode::Search, Action::ScrollDown) => tui_app.move_selection(1),
        (Mode::Search, Action::ScrollUp) => tui_app.move_selection(-1),
        (Mode::Search, Action::Search) => tui_app.search_editing = true,
        (Mode::Search, Action::Select) => {
            if let Some(result) = tui_app.selected_result().cloned() {
                tui_app.close_overlay();
                let ctx = ctx.clone();
                spawn_navigation(tasks, async move {
                    ctx.search.select_result(&result, &ctx.reader).await
                });
            } else if let Some(query) = tui_app.selected_history().cloned() {
                tui_app.search_input = query.clone();
                start_search(tui_app, ctx, tasks, query, false);
            }
        }

        (Mode::Versions, Action::ScrollDown) => tui_app.move_selection(1),
        (Mode::Versions, Action::ScrollUp) => tui_app.move_selection(-1),
        (Mode::Versions, Action::Select) => {
            if let Some(version) = tui_app.selected_version().cloned() {
                tui_app.close_overlay();
                let reader = ctx.reader.clone();
                spawn_task(tasks, async move {
                    let result = reader.set_current_version(version.clone()).await;
                    Background::VersionSwitch(version, result)
                });
            }
        }
        (Mode::Versions, Action::SetDefaultVersion) => {
            if let Some(version) = tui_app.selected_version().cloned() {
                match ctx.catalog.set_default_version(&version.id) {
                    Ok(()) => {
                        for v in &mut tui_app.versions {
                            v.is_default = v.id == version.id;
                        }
                        tui_app.set_status(format!("Default version: {}", version.abbreviation));
                    }
                    Err(e) => report(tui_app, e),
                }
            }
        }

        (Mode::Search | Mode::Versions | Mode::Stats, Action::Cancel) => tui_app.close_overlay(),
        (Mode::Stats, Action::Stats) => tui_app.close_overlay(),

        _ => {}
    }
}

/// Run a search in the background. Only submitted queries enter the history.
fn start_search(
    tui_app: &mut TuiApp,
    ctx: &Arc<AppContext>,
    tasks: &Tasks,
    query: String,
    submitted: bool,
) {
    tui_app.search.is_searching = true;
    tui_app.search.error = None;
    tui_app.search.last_query = Some(query.clone());

    let ctx = ctx.clone();
    spawn_task(tasks, async move {
        let max = ctx.config.search.max_results;
        // Failures land in the search state.
        let _ = if submitted {
            ctx.search.search_verses(&query, max).await
        } else {
            ctx.search.replay(&query, max).await
        };
        Background::SearchDone
    });
}

fn handle_search_input(tui_app: &mut TuiApp, ctx: &Arc<AppContext>, tasks: &Tasks, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            if tui_app.search_input.is_empty() {
                tui_app.close_overlay();
            } else {
                tui_app.search_editing = false;
            }
        }
        KeyCode::Enter => {
            tui_app.search_editing = false;
            let query = tui_app.search_input.clone();
            if query.trim().is_empty() {
                if let Some(entry) = tui_app.selected_history().cloned() {
                    tui_app.search_input = entry.clone();
                    start_search(tui_app, ctx, tasks, entry, false);
                }
            } else {
                start_search(tui_app, ctx, tasks, query, true);
            }
        }
        KeyCode::Backspace => {
            tui_app.search_input.pop();
        }
        KeyCode::Down => {
            tui_app.search_editing = false;
            tui_app.move_selection(1);
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            tui_app.should_quit = true;
        }
        KeyCode::Char(c) => tui_app.search_input.push(c),
        _ => {}
    }
}

fn handle_mouse(tui_app: &mut TuiApp, ctx: &AppContext, tasks: &Tasks, mouse: MouseEvent) {
    if tui_app.mode != Mode::Reading {
        return;
    }
    let now = Instant::now();
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            tui_app.drag = Some(PointerDrag::start(mouse.column, now));
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if let Some(drag) = tui_app.drag {
                ctx.reader.drag(drag.translation(mouse.column));
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            if let Some(drag) = tui_app.drag.take() {
                let swipe = drag.finish(mouse.column, now);
                let reader = ctx.reader.clone();
                spawn_navigation(tasks, async move { reader.release_swipe(swipe).await });
            }
        }
        MouseEventKind::ScrollDown => tui_app.scroll_down(3),
        MouseEventKind::ScrollUp => tui_app.scroll_up(3),
        _ => {}
    }
}

fn navigation_result(tui_app: &mut TuiApp, result: Result<NavigationOutcome>) {
    match result {
        Ok(NavigationOutcome::AtBoundary) => {
            tui_app.set_status("No more chapters in that direction".to_string())
        }
        Ok(_) => tui_app.clear_status(),
        Err(e) => report(tui_app, e),
    }
}

/// Fetch failures already show in the status bar through the reader state.
fn report(tui_app: &mut TuiApp, error: LectioError) {
    match error.fetch_error() {
        Some(_) => tui_app.clear_status(),
        None => tui_app.set_status(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::provider::MemoryProvider;

    async fn context(provider: Arc<MemoryProvider>) -> Arc<AppContext> {
        let mut config = Config::default();
        config.reader.prefetch_adjacent = false;
        Arc::new(AppContext::in_memory(config, provider).await.unwrap())
    }

    #[tokio::test]
    async fn test_chapter_turn_does_not_block_the_event_loop() {
        let provider = Arc::new(MemoryProvider::synthetic(&[VersionDescriptor::new(
            "kjv",
            "King James Version",
            "KJV",
            "en",
        )]));
        provider.set_delay("GEN", 1, Duration::from_millis(200));
        let ctx = context(provider).await;
        let mut tui_app = TuiApp::new(ctx.reader.snapshot(), ctx.tracker.snapshot());
        let (tasks, mut done) = mpsc::unbounded_channel();

        let started = Instant::now();
        handle_action(&mut tui_app, &ctx, &tasks, Action::NextChapter);
        assert!(started.elapsed() < Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ctx.reader.snapshot().is_loading());

        let finished = done.recv().await.unwrap();
        apply_background(&mut tui_app, &ctx, finished);
        let position = ctx.reader.position().unwrap();
        assert_eq!((position.book.as_str(), position.chapter), ("GEN", 1));
        assert!(tui_app.status_message.is_none());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_version_list_arrives_as_overlay() {
        let provider = Arc::new(MemoryProvider::synthetic(&[
            VersionDescriptor::new("kjv", "King James Version", "KJV", "en"),
            VersionDescriptor::new("web", "World English Bible", "WEB", "en"),
        ]));
        let ctx = context(provider).await;
        let mut tui_app = TuiApp::new(ctx.reader.snapshot(), ctx.tracker.snapshot());
        let (tasks, mut done) = mpsc::unbounded_channel();

        handle_action(&mut tui_app, &ctx, &tasks, Action::Versions);
        assert_eq!(tui_app.mode, Mode::Reading);

        let finished = done.recv().await.unwrap();
        apply_background(&mut tui_app, &ctx, finished);
        assert_eq!(tui_app.mode, Mode::Versions);
        assert_eq!(tui_app.versions.len(), 2);
        assert_eq!(tui_app.selected_version().unwrap().id, "kjv");
        ctx.shutdown().await;
    }
}
