use super::picker::PickerState;
use super::App;
use crate::chat::{ChatMessage, ChatState, Role};
use crate::subtitle::SubtitleKind;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn render(app: &mut App, frame: &mut Frame) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(app, frame, header);

    match app.session.state().clone() {
        ChatState::Started => render_picker(app, frame, body, None),
        ChatState::SubtitleSelected { selected_subtitle } => render_waiting(
            app,
            frame,
            body,
            &format!("Downloading {} subtitles...", selected_subtitle.name),
        ),
        ChatState::SubtitleDownloaded { .. } => {
            let description = app.session.machine().description();
            render_picker(app, frame, body, Some(description));
        }
        ChatState::ChatInitializing { .. } => {
            render_waiting(app, frame, body, "Initializing AI chat service...")
        }
        ChatState::ChatInitFailed { error, .. } => render_init_failed(frame, body, &error),
        ChatState::ChatReady { .. } | ChatState::ChatActive { .. } => {
            render_chat(app, frame, body)
        }
    }

    render_footer(app, frame, footer);
}

fn spinner(app: &App) -> &'static str {
    SPINNER[app.spinner % SPINNER.len()]
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let machine = app.session.machine();
    let title = match machine.current_video_name() {
        Some(name) => format!(" vidchat: {} ", name),
        None => " vidchat ".to_string(),
    };

    let status_style = if machine.is_error() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    };

    let line = Line::from(vec![
        Span::styled(machine.description(), status_style),
        Span::styled(format!("  {}", app.info.url), Style::default().fg(Color::DarkGray)),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(Span::styled(title, Style::default().fg(Color::Cyan).bold()))
            .title_bottom(Line::from(format!(" {} ", app.info.model_label)).right_aligned()),
    );
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = match app.session.state() {
        ChatState::Started => "↑/↓ select  Enter download  q quit",
        ChatState::SubtitleDownloaded { .. } => "↑/↓ select  Enter download  r retry  q quit",
        ChatState::ChatInitFailed { .. } => "Enter retry  q quit",
        ChatState::ChatReady { .. } | ChatState::ChatActive { .. } => {
            "Enter send  Tab complete  PgUp/PgDn scroll  /help commands  Ctrl-C quit"
        }
        _ => "Ctrl-C quit",
    };

    let line = match &app.notice {
        Some(notice) => Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Yellow))),
        None => Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray))),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_waiting(app: &App, frame: &mut Frame, area: Rect, message: &str) {
    let text = Line::from(vec![
        Span::styled(spinner(app), Style::default().fg(Color::Cyan)),
        Span::raw(" "),
        Span::raw(message.to_string()),
    ]);
    let block = Block::default().borders(Borders::ALL);
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn render_init_failed(frame: &mut Frame, area: Rect, error: &str) {
    let text = Text::from(vec![
        Line::from(Span::styled(
            "Failed to initialize AI chat service",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(error.to_string()),
        Line::default(),
        Line::from(Span::styled(
            "Press Enter to try again.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }).block(block), area);
}

fn render_picker(app: &mut App, frame: &mut Frame, area: Rect, failure: Option<String>) {
    let area = match failure {
        Some(message) => {
            let [notice, rest] =
                Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(area);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red));
            frame.render_widget(
                Paragraph::new(Span::styled(message, Style::default().fg(Color::Red)))
                    .wrap(Wrap { trim: true })
                    .block(block),
                notice,
            );
            rest
        }
        None => area,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Select a subtitle track ");

    let spin = spinner(app);
    let items: Vec<ListItem> = match app.picker.state() {
        PickerState::Loading => {
            let text = format!("{} Fetching available subtitles...", spin);
            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        }
        PickerState::Error(message) => {
            let text = Span::styled(message.clone(), Style::default().fg(Color::Red));
            frame.render_widget(
                Paragraph::new(text).wrap(Wrap { trim: true }).block(block),
                area,
            );
            return;
        }
        PickerState::Empty => {
            let text = Span::styled(
                "No subtitles available for this video.",
                Style::default().fg(Color::DarkGray),
            );
            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        }
        PickerState::Ready(langs) => langs
            .iter()
            .map(|lang| {
                let kind = match lang.kind {
                    SubtitleKind::Uploaded => "",
                    SubtitleKind::Auto => " (auto)",
                };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{}{}", lang.name, kind)),
                    Span::styled(format!("  [{}]", lang.code), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect(),
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, app.picker.list_state_mut());
}

fn message_lines(message: &ChatMessage, spin: &'static str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match message.role {
        Role::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
        }
        Role::Assistant => {
            let mut header = vec![Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )];
            if message.is_streaming() {
                header.push(Span::styled(
                    format!(" {}", spin),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.push(Line::from(header));
        }
    }

    if message.is_streaming() && message.content.is_empty() {
        lines.push(Line::from(Span::styled(
            "Thinking...",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    for line in message.content.lines() {
        lines.push(markdown_line(line));
    }
    lines.push(Line::default());
    lines
}

/// Light styling for headings, bullets and code fences.
fn markdown_line(line: &str) -> Line<'static> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        let heading = trimmed.trim_start_matches('#').trim().to_string();
        Line::from(Span::styled(heading, Style::default().add_modifier(Modifier::BOLD)))
    } else if trimmed.starts_with("```") {
        Line::from(Span::styled(line.to_string(), Style::default().fg(Color::DarkGray)))
    } else if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        let indent = line.len() - trimmed.len();
        Line::from(format!("{}• {}", " ".repeat(indent), rest))
    } else {
        Line::from(line.to_string())
    }
}

/// Rows a set of lines takes once wrapped to `width`.
/// Rows the log takes once word-wrapped, measured the same way the
/// rendered paragraph wraps.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let rows = Paragraph::new(lines.to_vec())
        .wrap(Wrap { trim: false })
        .line_count(width.max(1));
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let suggestion_rows = app.input.suggestions().len() as u16;
    let suggestions_height = if suggestion_rows > 0 { suggestion_rows + 2 } else { 0 };

    let [log_area, suggestions_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(suggestions_height),
        Constraint::Length(3),
    ])
    .areas(area);

    let spin = spinner(app);
    let messages = app.session.messages();
    let lines: Vec<Line> = if messages.is_empty() {
        vec![Line::from(Span::styled(
            "Ready to chat! Ask anything about the video, or type /help.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        messages
            .iter()
            .flat_map(|message| message_lines(message, spin))
            .collect()
    };

    let inner_width = log_area.width.saturating_sub(2);
    let inner_height = log_area.height.saturating_sub(2);
    let total = wrapped_height(&lines, inner_width);
    let max_scroll = total.saturating_sub(inner_height);
    app.scroll_back = app.scroll_back.min(max_scroll);
    let scroll = max_scroll - app.scroll_back;

    let log = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(" Chat "))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(log, log_area);

    if suggestions_height > 0 {
        let selected = app.input.selected_index();
        let items: Vec<ListItem> = app
            .input
            .suggestions()
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let style = if i == selected {
                    Style::default().fg(Color::Black).bg(Color::Cyan)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(s.command, style.add_modifier(Modifier::BOLD)),
                    Span::styled(format!("  {}", s.description), style),
                ]))
            })
            .collect();
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Commands (Tab to complete) "),
        );
        frame.render_widget(list, suggestions_area);
    }

    let busy = app.session.is_busy();
    let border = if busy { Color::DarkGray } else { Color::Yellow };
    let title = if busy { " Waiting for reply... " } else { " Message " };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title);

    let inner = usize::from(input_area.width.saturating_sub(2));
    let cursor = app.input.cursor();
    let offset = if inner > 0 && cursor >= inner {
        cursor - inner + 1
    } else {
        0
    };
    let visible: String = app.input.text().chars().skip(offset).take(inner).collect();
    frame.render_widget(
        Paragraph::new(visible)
            .style(Style::default().fg(Color::Cyan))
            .block(input_block),
        input_area,
    );

    let cursor_x = u16::try_from(cursor - offset).unwrap_or(0);
    frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
}
