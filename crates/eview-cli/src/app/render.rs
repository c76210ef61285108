//! Drawing. Reads state only; every mutation goes through `App`.

use super::{App, Focus, TabView};
use crate::editor::EditorPane;
use crate::preview::PreviewPane;
use eview::{BufferKind, PathKind, Registry, Session, SessionState};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Tabs};
use ratatui::Frame;

const LABEL_WIDTH: u16 = 9;

pub(super) fn draw(frame: &mut Frame, app: &App, registry: &Registry<PreviewPane>) {
    let Some(tab) = app.active_tab() else {
        return;
    };
    let Some(session) = registry.get(tab.id) else {
        return;
    };

    let group = session.preset().group();
    let members: Vec<&Session<PreviewPane>> = registry
        .sessions()
        .filter(|other| other.preset().group() == group)
        .collect();
    let nested = members.len() > 1;

    let [groups_area, members_area, notice_area, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(u16::from(nested)),
        Constraint::Length(u16::from(session.notice().is_some())),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_groups(frame, groups_area, registry, group);
    if nested {
        let titles: Vec<&str> = members.iter().map(|member| member.preset().title()).collect();
        let selected = members.iter().position(|member| member.id() == tab.id);
        frame.render_widget(
            Tabs::new(titles)
                .select(selected.unwrap_or(0))
                .highlight_style(Style::default().fg(Color::Yellow)),
            members_area,
        );
    }
    if let Some(notice) = session.notice() {
        frame.render_widget(
            Paragraph::new(format!(" {notice}  [Esc]")).style(Style::default().fg(Color::Red)),
            notice_area,
        );
    }

    let [left, right] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(body);
    draw_editors(frame, left, tab, session);
    draw_output(frame, right, session);
    draw_footer(frame, footer, session);
}

fn draw_groups(frame: &mut Frame, area: Rect, registry: &Registry<PreviewPane>, active: &str) {
    let mut groups: Vec<&str> = Vec::new();
    for session in registry.sessions() {
        let group = session.preset().group();
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    let selected = groups.iter().position(|group| *group == active);
    frame.render_widget(
        Tabs::new(groups).select(selected.unwrap_or(0)).highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        area,
    );
}

fn draw_editors(frame: &mut Frame, area: Rect, tab: &TabView, session: &Session<PreviewPane>) {
    let command_height = if tab.command_open { 8 } else { 0 };
    let [command_area, script_area, files_area] = Layout::vertical([
        Constraint::Length(command_height),
        Constraint::Min(3),
        Constraint::Length(6),
    ])
    .areas(area);

    if tab.command_open {
        draw_editor(
            frame,
            command_area,
            "Command",
            &tab.command,
            tab.focus == Focus::Buffer(BufferKind::Command),
        );
    }
    draw_editor(
        frame,
        script_area,
        "Script",
        &tab.script,
        tab.focus == Focus::Buffer(BufferKind::Script),
    );

    let block = Block::bordered()
        .title(" Files ")
        .border_style(border(matches!(tab.focus, Focus::Path(_))));
    let inner = block.inner(files_area);
    frame.render_widget(block, files_area);

    let [folder, first, second, third] = Layout::vertical([Constraint::Length(1); 4]).areas(inner);
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            label("Folder"),
            Span::raw(session.workspace().root().display().to_string()),
        ])),
        folder,
    );
    for (row, kind) in [first, second, third].into_iter().zip(PathKind::ALL) {
        if let Some(field) = tab.path_field(kind) {
            draw_path_field(frame, row, kind, field, tab.focus == Focus::Path(kind));
        }
    }
}

fn draw_editor(frame: &mut Frame, area: Rect, title: &str, editor: &EditorPane, focused: bool) {
    let block = Block::bordered()
        .title(format!(" {title} "))
        .border_style(border(focused));
    let inner = block.inner(area);
    let (row, column) = editor.cursor_position();
    let (row, column) = (to_u16(row), to_u16(column));
    let scroll_y = row.saturating_sub(inner.height.saturating_sub(1));
    let scroll_x = column.saturating_sub(inner.width.saturating_sub(1));
    frame.render_widget(
        Paragraph::new(editor.as_str())
            .block(block)
            .scroll((scroll_y, scroll_x)),
        area,
    );
    if focused {
        frame.set_cursor_position((inner.x + column - scroll_x, inner.y + row - scroll_y));
    }
}

fn draw_path_field(frame: &mut Frame, area: Rect, kind: PathKind, field: &EditorPane, focused: bool) {
    let [label_area, text_area] =
        Layout::horizontal([Constraint::Length(LABEL_WIDTH), Constraint::Min(0)]).areas(area);
    let name = match kind {
        PathKind::Command => "Command",
        PathKind::Script => "Script",
        PathKind::Output => "Output",
    };
    frame.render_widget(Paragraph::new(label(name)), label_area);

    let (_, column) = field.cursor_position();
    let column = to_u16(column);
    let scroll_x = column.saturating_sub(text_area.width.saturating_sub(1));
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    frame.render_widget(
        Paragraph::new(field.as_str())
            .style(style)
            .scroll((0, scroll_x)),
        text_area,
    );
    if focused {
        frame.set_cursor_position((text_area.x + column - scroll_x, text_area.y));
    }
}

fn draw_output(frame: &mut Frame, area: Rect, session: &Session<PreviewPane>) {
    let [preview_area, log_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(10)]).areas(area);

    let block = Block::bordered()
        .title(" Preview ")
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(preview_area);
    frame.render_widget(block, preview_area);
    if session.display().has_image() {
        session.display().render(inner, frame.buffer_mut());
    } else {
        let placeholder = if session.state() == SessionState::Running {
            "Rendering..."
        } else {
            "No image"
        };
        frame.render_widget(
            Paragraph::new(placeholder).style(Style::default().fg(Color::DarkGray)),
            inner,
        );
    }

    let block = Block::bordered()
        .title(" Output ")
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(log_area);
    let lines = to_u16(session.log().lines().count());
    frame.render_widget(
        Paragraph::new(session.log())
            .block(block)
            .scroll((lines.saturating_sub(inner.height), 0)),
        log_area,
    );
}

fn draw_footer(frame: &mut Frame, area: Rect, session: &Session<PreviewPane>) {
    let state = match session.state() {
        SessionState::Idle => Span::styled("Idle", Style::default().fg(Color::Green)),
        SessionState::Pending => Span::styled("Pending", Style::default().fg(Color::Yellow)),
        SessionState::Running => Span::styled("Running", Style::default().fg(Color::Yellow)),
    };
    let result = session
        .last_result()
        .map(|result| result.label())
        .unwrap_or("no runs yet");
    let hints = Style::default().fg(Color::DarkGray);
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw(" "),
            state,
            Span::raw(" │ "),
            Span::raw(result),
            Span::raw(format!(" │ runs {}", session.runs_started())),
            Span::raw(" │ "),
            Span::styled("^Q quit  ^N/^P tab  ^K command  ^R render  Tab focus  Enter apply path", hints),
        ])),
        area,
    );
}

fn border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn label(text: &str) -> Span<'static> {
    Span::styled(
        format!("{text:<width$}", width = usize::from(LABEL_WIDTH)),
        Style::default().fg(Color::DarkGray),
    )
}

fn to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
