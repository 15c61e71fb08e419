use parley_core::{Message, Role, Route};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, AuthForm, Field, Focus};

const DOTS: [&str; 4] = ["", ".", "..", "..."];

pub fn draw(f: &mut Frame, app: &App) {
    match app.route {
        Route::Login => draw_auth(
            f,
            app,
            &app.login,
            "Sign in",
            "[Tab] Switch field  [Enter] Sign in  [Ctrl+R] Create account  [Ctrl+C] Quit",
        ),
        Route::Register => draw_auth(
            f,
            app,
            &app.register,
            "Create account",
            "[Tab] Switch field  [Enter] Register  [Esc] Back to sign in  [Ctrl+C] Quit",
        ),
        Route::Chat => draw_chat(f, app),
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_auth(f: &mut Frame, app: &App, form: &AuthForm, title: &str, help: &str) {
    let area = centered(f.size(), 60, 14);
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Parley · {} ", title))
        .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Email
            Constraint::Length(3), // Password
            Constraint::Length(1), // Error / info
            Constraint::Min(1),    // Help
        ])
        .split(inner);

    let field = |label: &str, value: String, focused: bool| {
        let border = if focused { Color::Green } else { Color::Gray };
        let mut spans = vec![Span::raw(value)];
        if focused && !form.submitting {
            spans.push(Span::styled("▌", Style::default().fg(Color::Green)));
        }
        Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(label.to_string())
                .border_style(Style::default().fg(border)),
        )
    };

    f.render_widget(
        field("Email", form.email.clone(), form.focus == Field::Email),
        rows[0],
    );
    f.render_widget(
        field(
            "Password",
            "•".repeat(form.password.chars().count()),
            form.focus == Field::Password,
        ),
        rows[1],
    );

    let status = if form.submitting {
        Line::from(Span::styled(
            "Please wait...",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
    } else if let Some(error) = &form.error {
        Line::from(Span::styled(error.as_str(), Style::default().fg(Color::Red)))
    } else if let Some(info) = &form.info {
        Line::from(Span::styled(info.as_str(), Style::default().fg(Color::Green)))
    } else {
        Line::from("")
    };
    f.render_widget(Paragraph::new(status), rows[2]);

    let help = Paragraph::new(vec![
        Line::from(Span::styled(help, Style::default().fg(Color::Gray))),
        Line::from(Span::styled(
            app.server_url.as_str(),
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .wrap(Wrap { trim: true });
    f.render_widget(help, rows[3]);
}

fn draw_chat(f: &mut Frame, app: &App) {
    let notice_height = if app.controller.notice().is_some() { 1 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Header
            Constraint::Min(5),                // Body
            Constraint::Length(notice_height), // Notification
            Constraint::Length(3),             // Input
            Constraint::Length(1),             // Status bar
        ])
        .split(f.size());

    draw_header(f, app, chunks[0]);

    if app.show_sidebar {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
            .split(chunks[1]);
        draw_sidebar(f, app, body[0]);
        draw_messages(f, app, body[1]);
    } else {
        draw_messages(f, app, chunks[1]);
    }

    if notice_height > 0 {
        draw_notice(f, app, chunks[2]);
    }
    draw_input(f, app, chunks[3]);
    draw_status_bar(f, app, chunks[4]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let title = app
        .controller
        .active_conversation()
        .map(|c| c.title.as_str())
        .unwrap_or("No conversation");

    let header_text = Line::from(vec![
        Span::styled(
            " Parley ",
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
        ),
        Span::styled("  |  ", Style::default().fg(Color::Gray)),
        Span::styled(title, Style::default().fg(Color::White)),
        Span::styled("  |  ", Style::default().fg(Color::Gray)),
        Span::styled("● Signed in", Style::default().fg(Color::Green)),
        Span::styled(
            format!("  {}", app.server_url),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(header_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let border = if app.focus == Focus::Sidebar {
        Color::Green
    } else {
        Color::Blue
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Chats")
        .border_style(Style::default().fg(border));

    let placeholder = if app.controller.is_loading_conversations() && !app.controller.is_loaded() {
        Some(format!("Loading chats{}", DOTS[app.tick % DOTS.len()]))
    } else if app.controller.registry().is_empty() {
        Some("No chats yet.\nCtrl+N starts one.".to_string())
    } else {
        None
    };

    if let Some(text) = placeholder {
        let paragraph = Paragraph::new(text)
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = app
        .controller
        .conversations()
        .map(|conversation| {
            let active = app.controller.current() == Some(conversation.id.as_str());
            let style = if active {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(
                truncate(&conversation.title, width),
                style,
            )))
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if out.width() + 2 > width {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

fn draw_messages(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Messages")
        .border_style(Style::default().fg(Color::Blue));

    let Some(conversation) = app.controller.active_conversation() else {
        let hint = Paragraph::new("Select a chat or press Ctrl+N to start a new one")
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(hint, area);
        return;
    };

    if conversation.messages.is_empty() && !app.controller.is_loading() {
        let hint = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "Start a conversation",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Type a message below and press Enter",
                Style::default().fg(Color::Gray),
            )),
        ])
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(hint, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for message in &conversation.messages {
        lines.extend(format_message(message));
    }
    if app.controller.is_loading() {
        lines.push(Line::from(Span::styled(
            format!("Assistant is typing{}", DOTS[app.tick % DOTS.len()]),
            Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
        )));
    }

    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let visible = area.height.saturating_sub(2);
    let total: usize = lines
        .iter()
        .map(|line| {
            let width: usize = line.spans.iter().map(|s| s.content.width()).sum();
            width.max(1).div_ceil(inner_width)
        })
        .sum();
    let total = u16::try_from(total).unwrap_or(u16::MAX);
    let top = total
        .saturating_sub(visible)
        .saturating_sub(app.scroll_offset);

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((top, 0));
    f.render_widget(paragraph, area);
}

fn format_message(message: &Message) -> Vec<Line<'_>> {
    let (label, style) = match message.role {
        Role::User => ("You", Style::default().fg(Color::Cyan)),
        Role::Assistant => ("Assistant", Style::default().fg(Color::Green)),
    };

    let mut lines = vec![Line::from(Span::styled(
        label,
        style.add_modifier(Modifier::BOLD),
    ))];
    for text in message.content.lines() {
        lines.push(Line::from(Span::styled(format!("  {}", text), style)));
    }
    // Empty line for separation
    lines.push(Line::from(""));
    lines
}

fn draw_notice(f: &mut Frame, app: &App, area: Rect) {
    if let Some(notice) = app.controller.notice() {
        let line = Line::from(vec![
            Span::styled(
                format!(" {} ", notice.at.format("%H:%M:%S")),
                Style::default().fg(Color::White).bg(Color::Red),
            ),
            Span::styled(
                format!(" {} ", notice.message),
                Style::default().fg(Color::Red),
            ),
            Span::styled("[Esc] dismiss", Style::default().fg(Color::Gray)),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Input;
    let border = if focused { Color::Green } else { Color::Blue };

    let input_text = if app.input.is_empty() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(
                "Type a message and press Enter to send...",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ),
        ])
    } else {
        let mut spans = vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
        ];
        if focused {
            spans.push(Span::styled("▌", Style::default().fg(Color::Green)));
        }
        Line::from(spans)
    };

    let input = Paragraph::new(input_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Input")
                .border_style(Style::default().fg(border)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(input, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if app.confirm_logout {
        (
            " Log out? [y] Yes  [n] No ".to_string(),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )
    } else {
        let help = match app.focus {
            Focus::Sidebar => "[Up/Down] Select  [Tab] Input  [Ctrl+B] Hide chats",
            Focus::Input => "[Enter] Send  [Tab] Chats  [Ctrl+P/J] Prev/Next",
        };
        (
            format!(
                " Chats: {} | {}  [Ctrl+N] New  [Ctrl+L] Log out  [Ctrl+C] Quit",
                app.controller.registry().len(),
                help
            ),
            Style::default().fg(Color::Gray).add_modifier(Modifier::REVERSED),
        )
    };

    let status_bar = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(style);

    f.render_widget(status_bar, area);
}
