use crate::state::{App, Entry, Listing, Mode, Target, TABS};
use crate::theme::{self, icons};
use dlview_inspect::VarRowKind;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

const CONSOLE_LINES: u16 = 6;

pub fn render(f: &mut Frame, app: &mut App) {
    app.refresh_listing();

    let area = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(CONSOLE_LINES + 2),
            Constraint::Length(1),
        ])
        .split(area);

    render_tabs(f, app, chunks[0]);
    render_listing(f, app, chunks[1]);
    render_console(f, app, chunks[2]);
    render_footer(f, app, chunks[3]);
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = TABS.iter().map(|kind| Line::from(kind.name())).collect();
    let session = app.inspector.session();
    let title = if session.running {
        "dlview (running)".to_string()
    } else {
        format!(
            "dlview goroutine {} frame {}",
            session.goroutine_id, session.frame
        )
    };
    let tabs = Tabs::new(titles)
        .select(app.tab)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(theme::HEADER_STYLE);
    f.render_widget(tabs, area);
}

fn render_listing(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(app.current_tab().name())
        .border_style(Style::default().fg(Color::Cyan));

    let entries = match &app.listing {
        Listing::Placeholder(placeholder) => {
            let p = Paragraph::new(Span::styled(placeholder.label(), theme::PLACEHOLDER_STYLE))
                .block(block);
            f.render_widget(p, area);
            return;
        }
        Listing::Entries(entries) => entries,
    };

    let items: Vec<ListItem> = entries.iter().map(entry_line).map(ListItem::new).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn entry_line(entry: &Entry) -> Line<'static> {
    let mut spans = Vec::new();
    if entry.depth > 0 {
        spans.push(Span::raw("  ".repeat(entry.depth)));
    }
    if entry.current {
        spans.push(Span::styled(format!("{} ", icons::CURRENT), theme::CURRENT_STYLE));
    }
    let style = match &entry.target {
        Target::Var(row) => match &row.kind {
            VarRowKind::Branch { expanded, .. } => {
                let icon = if *expanded {
                    icons::EXPANDED
                } else {
                    icons::COLLAPSED
                };
                spans.push(Span::styled(format!("{icon} "), Color::Blue));
                Style::default()
            }
            VarRowKind::Note(_) => theme::NOTE_STYLE,
            VarRowKind::More { .. } => theme::MORE_STYLE,
            VarRowKind::Value(_) | VarRowKind::Separator => Style::default(),
        },
        _ if entry.current => theme::CURRENT_STYLE,
        _ => Style::default(),
    };
    spans.push(Span::styled(entry.text.clone(), style));
    Line::from(spans)
}

fn render_console(f: &mut Frame, app: &App, area: Rect) {
    let console = app.inspector.console();
    let skip = console.len().saturating_sub(CONSOLE_LINES as usize);
    let lines: Vec<Line> = console
        .iter()
        .skip(skip)
        .map(|line| Line::from(Span::styled(line.as_str(), theme::CONSOLE_STYLE)))
        .collect();
    let p = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Console"))
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.mode {
        Mode::Filter => Line::from(vec![
            Span::styled("filter: ", theme::HEADER_STYLE),
            Span::raw(app.filter.as_str()),
        ]),
        Mode::Normal => Line::from(Span::styled(
            "Tab panels  j/k move  Enter select/expand  / filter  a address  l location  +/- depth  d/D clear bp  t tracepoint  r reload  q quit",
            theme::NOTE_STYLE,
        )),
    };
    f.render_widget(Paragraph::new(line), area);
}
