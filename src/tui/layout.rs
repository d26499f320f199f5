use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::cli::commands::stats_lines;
use crate::config::ColorConfig;
use crate::reader::ReaderStatus;
use crate::tui::app::{Mode, TuiApp};

pub fn render(frame: &mut Frame, app: &mut TuiApp, colors: &ColorConfig) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Chapter text
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    app.viewport_height = chunks[0].height.saturating_sub(2);
    render_chapter_pane(frame, app, chunks[0], colors);
    render_status_bar(frame, app, chunks[1], colors);

    match app.mode {
        Mode::Reading => {}
        Mode::Search => render_search_overlay(frame, app, centered(frame.area(), 80, 70), colors),
        Mode::Versions => render_versions_overlay(frame, app, centered(frame.area(), 60, 50), colors),
        Mode::Stats => render_stats_overlay(frame, app, centered(frame.area(), 50, 40), colors),
    }
}

fn render_chapter_pane(frame: &mut Frame, app: &TuiApp, area: Rect, colors: &ColorConfig) {
    let state = &app.reader;
    let is_read = state
        .position
        .as_ref()
        .is_some_and(|p| app.stats.is_chapter_read(&p.book, p.chapter));

    let mut title = vec![Span::raw(format!(" {} ", state.title()))];
    if is_read {
        title.push(Span::styled("✓ ", Style::default().fg(colors.read_marker)));
    }
    if state.viewport.drag_offset != 0.0 {
        let arrow = if state.viewport.drag_offset < 0.0 { "→ " } else { "← " };
        title.push(Span::raw(arrow));
    }

    let now = Instant::now();
    let highlight = state
        .viewport
        .highlight
        .and_then(|h| h.opacity(now).map(|o| (h.verse, o)));

    let content = match &state.content {
        Some(content) => {
            let lines: Vec<Line> = content
                .verses
                .iter()
                .map(|verse| {
                    let number = Span::styled(
                        format!("{:>3} ", verse.number),
                        Style::default().fg(colors.verse_number),
                    );
                    let style = match highlight {
                        Some((v, opacity)) if v == verse.number && opacity >= 0.5 => Style::default()
                            .bg(colors.highlight_bg)
                            .fg(colors.highlight_fg),
                        Some((v, opacity)) if v == verse.number && opacity > 0.0 => {
                            Style::default().add_modifier(Modifier::BOLD)
                        }
                        _ => Style::default(),
                    };
                    Line::from(vec![number, Span::styled(verse.text.clone(), style)])
                })
                .collect();
            Text::from(lines)
        }
        None if state.is_loading() => Text::from("Loading..."),
        None => Text::from("Press / to search or n to start reading"),
    };

    let block = Block::default()
        .title(Line::from(title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.active_border));

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_search_overlay(frame: &mut Frame, app: &mut TuiApp, area: Rect, colors: &ColorConfig) {
    frame.render_widget(Clear, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let input_border = if app.search_editing {
        colors.active_border
    } else {
        colors.inactive_border
    };
    let cursor = if app.search_editing { "_" } else { "" };
    let input = Paragraph::new(format!("{}{}", app.search_input, cursor)).block(
        Block::default()
            .title(" Search ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(input_border)),
    );
    frame.render_widget(input, chunks[0]);

    let (title, items): (String, Vec<ListItem>) = if app.showing_history() {
        (
            " Recent searches ".to_string(),
            app.history.iter().map(|q| ListItem::new(q.clone())).collect(),
        )
    } else if let Some(error) = &app.search.error {
        (
            " Search failed ".to_string(),
            vec![ListItem::new(Span::styled(
                error.user_message(),
                Style::default().fg(colors.error_fg),
            ))],
        )
    } else {
        let title = if app.search.is_searching {
            " Searching... ".to_string()
        } else {
            format!(" {} results ", app.search.results.len())
        };
        let items = app
            .search
            .results
            .iter()
            .map(|r| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{} ", r.display_reference()),
                        Style::default().fg(colors.verse_number),
                    ),
                    Span::raw(r.text.clone()),
                ]))
            })
            .collect();
        (title, items)
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.inactive_border)),
        )
        .highlight_style(
            Style::default()
                .bg(colors.selection_bg)
                .fg(colors.selection_fg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[1], &mut app.search_list_state);
}

fn render_versions_overlay(frame: &mut Frame, app: &mut TuiApp, area: Rect, colors: &ColorConfig) {
    frame.render_widget(Clear, area);

    let current = app.reader.version.id.clone();
    let items: Vec<ListItem> = app
        .versions
        .iter()
        .map(|v| {
            let mut spans = vec![Span::raw(v.display_name())];
            if v.id == current {
                spans.push(Span::styled(" (current)", Style::default().fg(colors.read_marker)));
            }
            if v.is_default {
                spans.push(Span::styled(" [default]", Style::default().fg(colors.verse_number)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Versions (Enter: read, d: set default) ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.active_border)),
        )
        .highlight_style(
            Style::default()
                .bg(colors.selection_bg)
                .fg(colors.selection_fg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.version_list_state);
}

fn render_stats_overlay(frame: &mut Frame, app: &TuiApp, area: Rect, colors: &ColorConfig) {
    frame.render_widget(Clear, area);

    let lines: Vec<Line> = stats_lines(&app.stats).into_iter().map(Line::from).collect();
    let paragraph = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .title(" Progress ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.active_border)),
    );

    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, app: &TuiApp, area: Rect, colors: &ColorConfig) {
    let (status, fg) = match &app.reader.status {
        ReaderStatus::Error(failure) => (
            format!("{}  (r: retry)", failure.error.user_message()),
            colors.error_fg,
        ),
        ReaderStatus::Loading => ("Loading...".to_string(), colors.status_fg),
        _ => match &app.status_message {
            Some(msg) => (msg.clone(), colors.status_fg),
            None => (hint(app.mode).to_string(), colors.status_fg),
        },
    };

    let paragraph = Paragraph::new(status).style(Style::default().fg(fg).bg(colors.status_bg));

    frame.render_widget(paragraph, area);
}

fn hint(mode: Mode) -> &'static str {
    match mode {
        Mode::Reading => "n/p:Chapter  j/k:Scroll  /:Search  v:Versions  s:Stats  q:Quit",
        Mode::Search => "Enter:Search/Open  j/k:Move  Esc:Close",
        Mode::Versions => "Enter:Switch  d:Default  Esc:Close",
        Mode::Stats => "Esc:Close",
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
