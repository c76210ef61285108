//! Interactive terminal frontend.
//!
//! Layout per tab:
//! - command editor (collapsible) and script editor
//! - scratch folder and the three path fields
//! - image preview and command output
//!
//! Terminal input is read on its own thread and forwarded over a channel, so
//! the loop can wait on input and the engine at the same time.

mod render;

use crate::editor::EditorPane;
use crate::preview::PreviewPane;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use eview::{BufferKind, Editor, EngineConfig, PathKind, Registry, SessionId};
use miette::{IntoDiagnostic, Result};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use std::io;
use std::path::PathBuf;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Which field of a tab receives keystrokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    Buffer(BufferKind),
    Path(PathKind),
}

/// Frontend state of one session's tab.
struct TabView {
    id: SessionId,
    command: EditorPane,
    script: EditorPane,
    paths: Vec<(PathKind, EditorPane)>,
    focus: Focus,
    command_open: bool,
}

impl TabView {
    fn new(session: &eview::Session<PreviewPane>) -> Self {
        Self {
            id: session.id(),
            command: EditorPane::new(session.buffer(BufferKind::Command)),
            script: EditorPane::new(session.buffer(BufferKind::Script)),
            paths: PathKind::ALL
                .into_iter()
                .map(|kind| {
                    let path = session.path(kind).display().to_string();
                    (kind, EditorPane::new(&path))
                })
                .collect(),
            focus: Focus::Buffer(BufferKind::Script),
            command_open: false,
        }
    }

    fn buffer_mut(&mut self, kind: BufferKind) -> &mut EditorPane {
        match kind {
            BufferKind::Command => &mut self.command,
            BufferKind::Script => &mut self.script,
        }
    }

    fn path_field(&self, kind: PathKind) -> Option<&EditorPane> {
        self.paths
            .iter()
            .find(|(which, _)| *which == kind)
            .map(|(_, field)| field)
    }

    fn path_field_mut(&mut self, kind: PathKind) -> Option<&mut EditorPane> {
        self.paths
            .iter_mut()
            .find(|(which, _)| *which == kind)
            .map(|(_, field)| field)
    }

    fn focused_mut(&mut self) -> Option<&mut EditorPane> {
        match self.focus {
            Focus::Buffer(kind) => Some(self.buffer_mut(kind)),
            Focus::Path(kind) => self.path_field_mut(kind),
        }
    }

    fn focus_order(&self) -> Vec<Focus> {
        let mut order = Vec::with_capacity(5);
        if self.command_open {
            order.push(Focus::Buffer(BufferKind::Command));
        }
        order.push(Focus::Buffer(BufferKind::Script));
        order.extend(PathKind::ALL.into_iter().map(Focus::Path));
        order
    }

    fn cycle_focus(&mut self, forward: bool) {
        let order = self.focus_order();
        let len = order.len();
        let at = order.iter().position(|focus| *focus == self.focus).unwrap_or(0);
        let next = if forward { (at + 1) % len } else { (at + len - 1) % len };
        if let Some(focus) = order.get(next) {
            self.focus = *focus;
        }
    }

    fn toggle_command(&mut self) {
        self.command_open = !self.command_open;
        if self.command_open {
            self.focus = Focus::Buffer(BufferKind::Command);
        } else if self.focus == Focus::Buffer(BufferKind::Command) {
            self.focus = Focus::Buffer(BufferKind::Script);
        }
    }
}

/// All tabs, in registry order.
struct App {
    tabs: Vec<TabView>,
    active: usize,
    quit: bool,
}

impl App {
    fn new(registry: &Registry<PreviewPane>) -> Self {
        let tabs: Vec<TabView> = registry.sessions().map(TabView::new).collect();
        let active = registry
            .active()
            .and_then(|id| tabs.iter().position(|tab| tab.id == id))
            .unwrap_or(0);
        Self {
            tabs,
            active,
            quit: false,
        }
    }

    fn active_tab(&self) -> Option<&TabView> {
        self.tabs.get(self.active)
    }

    fn handle_key(&mut self, key: KeyEvent, registry: &mut Registry<PreviewPane>) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') if ctrl => self.quit = true,
            KeyCode::Char('n') if ctrl => self.switch_tab(true, registry),
            KeyCode::Char('p') if ctrl => self.switch_tab(false, registry),
            KeyCode::Char('k') if ctrl => {
                if let Some(tab) = self.tabs.get_mut(self.active) {
                    tab.toggle_command();
                }
            }
            KeyCode::Char('r') if ctrl => {
                if let Some(session) = registry.active_session_mut() {
                    session.render_now();
                }
            }
            KeyCode::Tab => self.cycle_focus(true),
            KeyCode::BackTab => self.cycle_focus(false),
            KeyCode::Esc => {
                if let Some(session) = registry.active_session_mut() {
                    session.dismiss_notice();
                }
            }
            KeyCode::Enter => self.enter(registry),
            _ => self.edit(key, registry),
        }
    }

    fn switch_tab(&mut self, forward: bool, registry: &mut Registry<PreviewPane>) {
        let len = self.tabs.len();
        if len == 0 {
            return;
        }
        self.active = if forward {
            (self.active + 1) % len
        } else {
            (self.active + len - 1) % len
        };
        if let Some(tab) = self.tabs.get(self.active) {
            registry.activate(tab.id);
        }
    }

    fn cycle_focus(&mut self, forward: bool) {
        if let Some(tab) = self.tabs.get_mut(self.active) {
            tab.cycle_focus(forward);
        }
    }

    fn enter(&mut self, registry: &mut Registry<PreviewPane>) {
        let Some(tab) = self.tabs.get_mut(self.active) else {
            return;
        };
        let id = tab.id;
        match tab.focus {
            Focus::Buffer(kind) => {
                let editor = tab.buffer_mut(kind);
                editor.insert('\n');
                if let Some(session) = registry.get_mut(id) {
                    session.on_buffer_changed(kind, editor);
                }
            }
            Focus::Path(kind) => submit_path(tab, kind, registry),
        }
    }

    fn edit(&mut self, key: KeyEvent, registry: &mut Registry<PreviewPane>) {
        let Some(tab) = self.tabs.get_mut(self.active) else {
            return;
        };
        let focus = tab.focus;
        let id = tab.id;
        let Some(editor) = tab.focused_mut() else {
            return;
        };
        if !apply_edit(editor, key) {
            return;
        }
        if let (Focus::Buffer(kind), Some(session)) = (focus, registry.get_mut(id)) {
            session.on_buffer_changed(kind, editor);
        }
    }
}

/// Apply an editing key. Returns whether the text changed.
fn apply_edit(editor: &mut EditorPane, key: KeyEvent) -> bool {
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return false;
    }
    match key.code {
        KeyCode::Char(ch) => {
            editor.insert(ch);
            true
        }
        KeyCode::Backspace => editor.backspace(),
        KeyCode::Delete => editor.delete(),
        KeyCode::Left => {
            editor.left();
            false
        }
        KeyCode::Right => {
            editor.right();
            false
        }
        KeyCode::Up => {
            editor.up();
            false
        }
        KeyCode::Down => {
            editor.down();
            false
        }
        KeyCode::Home => {
            editor.home();
            false
        }
        KeyCode::End => {
            editor.end();
            false
        }
        _ => false,
    }
}

fn submit_path(tab: &mut TabView, kind: PathKind, registry: &mut Registry<PreviewPane>) {
    let Some(target) = tab
        .path_field(kind)
        .map(|field| PathBuf::from(field.as_str().trim()))
    else {
        return;
    };
    if target.as_os_str().is_empty() {
        return;
    }
    let Some(session) = registry.get_mut(tab.id) else {
        return;
    };
    // A failure is shown through the session's notice.
    if session.on_path_changed(kind, &target).is_err() {
        return;
    }
    if let Some(buffer) = kind.buffer() {
        session.load_into(buffer, tab.buffer_mut(buffer));
    }
    let resolved = session.path(kind).display().to_string();
    if let Some(field) = tab.path_field_mut(kind) {
        field.set_text(&resolved);
    }
}

enum Wake {
    Input(Option<Event>),
    Engine,
}

/// Run the frontend until the user quits.
pub async fn run(config: EngineConfig, startup_file: Option<PathBuf>) -> Result<()> {
    let mut registry = Registry::new(config, |_| PreviewPane::new())?;
    registry.start(startup_file.as_deref());
    let mut app = App::new(&registry);

    let (input_tx, mut input) = mpsc::unbounded_channel();
    thread::spawn(move || {
        while let Ok(event) = event::read() {
            if input_tx.send(event).is_err() {
                break;
            }
        }
    });

    enable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).into_diagnostic()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).into_diagnostic()?;
    info!(sessions = registry.len(), "frontend started");

    let outcome = event_loop(&mut terminal, &mut app, &mut registry, &mut input).await;

    disable_raw_mode().into_diagnostic()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).into_diagnostic()?;
    terminal.show_cursor().into_diagnostic()?;

    registry.shutdown().await?;
    outcome
}

async fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    registry: &mut Registry<PreviewPane>,
    input: &mut mpsc::UnboundedReceiver<Event>,
) -> Result<()> {
    loop {
        terminal
            .draw(|frame| render::draw(frame, app, registry))
            .into_diagnostic()?;

        let wake = tokio::select! {
            event = input.recv() => Wake::Input(event),
            _ = registry.turn() => Wake::Engine,
        };
        match wake {
            Wake::Input(Some(Event::Key(key))) => app.handle_key(key, registry),
            Wake::Input(Some(_)) | Wake::Engine => {}
            Wake::Input(None) => {
                debug!("input closed");
                return Ok(());
            }
        }
        if app.quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eview::{Preset, SessionState};
    use eview_fixtures::temp_dir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn registry(scratch: &std::path::Path) -> Registry<PreviewPane> {
        let config = EngineConfig {
            scratch_root: Some(scratch.to_path_buf()),
            ..EngineConfig::default()
        };
        let mut registry = Registry::new(config, |_| PreviewPane::new()).unwrap();
        registry.start(None);
        registry
    }

    #[tokio::test]
    async fn typing_in_script_updates_session() {
        let scratch = temp_dir("app");
        let mut registry = registry(scratch.path());
        let mut app = App::new(&registry);

        app.handle_key(key(KeyCode::Char('!')), &mut registry);

        let session = registry.active_session().unwrap();
        assert!(session.buffer(BufferKind::Script).ends_with('!'));
        assert_eq!(session.state(), SessionState::Pending);
        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn ctrl_n_and_ctrl_p_wrap_around_tabs() {
        let scratch = temp_dir("app");
        let mut registry = registry(scratch.path());
        let mut app = App::new(&registry);

        app.handle_key(ctrl('p'), &mut registry);
        assert_eq!(
            registry.active_session().unwrap().preset(),
            Preset::Custom
        );
        app.handle_key(ctrl('n'), &mut registry);
        app.handle_key(ctrl('n'), &mut registry);
        assert_eq!(
            registry.active_session().unwrap().preset(),
            Preset::Tex2imMath
        );
        assert!(registry.active_session().unwrap().is_shown());
        registry.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn ctrl_r_makes_render_due_now() {
        let scratch = temp_dir("app");
        let mut registry = registry(scratch.path());
        let mut app = App::new(&registry);

        app.handle_key(ctrl('r'), &mut registry);

        let deadline = registry.active_session().unwrap().deadline();
        assert_eq!(deadline, Some(tokio::time::Instant::now()));
        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn focus_skips_collapsed_command_editor() {
        let scratch = temp_dir("app");
        let mut registry = registry(scratch.path());
        let mut app = App::new(&registry);

        for _ in 0..4 {
            app.handle_key(key(KeyCode::Tab), &mut registry);
        }
        assert_eq!(
            app.active_tab().unwrap().focus,
            Focus::Buffer(BufferKind::Script)
        );

        app.handle_key(ctrl('k'), &mut registry);
        assert_eq!(
            app.active_tab().unwrap().focus,
            Focus::Buffer(BufferKind::Command)
        );
        app.handle_key(ctrl('k'), &mut registry);
        assert_eq!(
            app.active_tab().unwrap().focus,
            Focus::Buffer(BufferKind::Script)
        );
        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn submitting_script_path_loads_file() {
        let scratch = temp_dir("app");
        let file = scratch.path().join("wave.gp");
        std::fs::write(&file, "plot cos(x)").unwrap();
        let mut registry = registry(scratch.path());
        let mut app = App::new(&registry);

        app.handle_key(key(KeyCode::Tab), &mut registry);
        assert_eq!(
            app.active_tab().unwrap().focus,
            Focus::Path(PathKind::Script)
        );
        if let Some(field) = app
            .tabs
            .get_mut(app.active)
            .and_then(|tab| tab.path_field_mut(PathKind::Script))
        {
            field.set_text(&file.display().to_string());
        }
        app.handle_key(key(KeyCode::Enter), &mut registry);

        let session = registry.active_session().unwrap();
        assert_eq!(session.path(PathKind::Script), file);
        assert_eq!(app.active_tab().unwrap().script.as_str(), "plot cos(x)");
        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failed_submit_leaves_notice_and_editor() {
        let scratch = temp_dir("app");
        let mut registry = registry(scratch.path());
        let mut app = App::new(&registry);
        let before = app.active_tab().unwrap().script.as_str().to_string();

        app.handle_key(key(KeyCode::Tab), &mut registry);
        if let Some(field) = app
            .tabs
            .get_mut(app.active)
            .and_then(|tab| tab.path_field_mut(PathKind::Script))
        {
            field.set_text("/no/such/dir/plot.gp");
        }
        app.handle_key(key(KeyCode::Enter), &mut registry);

        assert!(registry.active_session().unwrap().notice().is_some());
        assert_eq!(app.active_tab().unwrap().script.as_str(), before);

        app.handle_key(key(KeyCode::Esc), &mut registry);
        assert!(registry.active_session().unwrap().notice().is_none());
        registry.shutdown().await.unwrap();
    }
}
