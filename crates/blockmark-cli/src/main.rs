use anyhow::{Context, Result};
use blockmark_config::Config;
use blockmark_engine::{
    Collaborators, Editor, EditorEvent, EditorSettings, EventOutcome, InlineMarker, Key, KeyPress,
    MemorySurface, NBSP, PLACEHOLDER, SurfaceRow, ViewKind,
};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::LevelFilter;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::{
    env,
    io::{Stdout, stdout},
    path::{Path, PathBuf},
    process,
};

struct App {
    file_path: PathBuf,
    editor: Editor<MemorySurface>,
    /// Inner area of the editor panel at the last draw
    content_area: Rect,
    scroll: usize,
    status: String,
}

impl App {
    fn new(file_path: PathBuf, settings: EditorSettings) -> Result<Self> {
        let text = if file_path.exists() {
            std::fs::read_to_string(&file_path)
                .with_context(|| format!("Failed to read {}", file_path.display()))?
        } else {
            log::info!("{} does not exist yet, starting empty", file_path.display());
            String::new()
        };

        let mut editor = Editor::with_collaborators(
            &text,
            MemorySurface::new(),
            Collaborators::default(),
            settings,
        );
        editor.render();

        // Start with the caret at the top of the first block
        if let Some(first) = editor.document().order().first().cloned() {
            editor.host_mut().place_caret(&first, 0);
            editor.dispatch(EditorEvent::SelectionChange);
        }

        Ok(Self {
            file_path,
            editor,
            content_area: Rect::default(),
            scroll: 0,
            status: String::new(),
        })
    }

    fn save(&mut self) -> Result<()> {
        let markdown = self.editor.markdown();
        std::fs::write(&self.file_path, markdown)
            .with_context(|| format!("Failed to write {}", self.file_path.display()))?;
        log::info!("saved {}", self.file_path.display());
        Ok(())
    }

    /// Returns false when the app should quit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        self.status.clear();

        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('q') if ctrl => return false,
            KeyCode::Char('s') if ctrl => {
                self.status = match self.save() {
                    Ok(()) => format!("Saved {}", self.file_path.display()),
                    Err(e) => format!("{e:#}"),
                };
            }
            KeyCode::Char('b') if ctrl => self.inline(InlineMarker::Strong),
            KeyCode::Char('e') if ctrl => self.inline(InlineMarker::Emphasis),
            KeyCode::Left => self.move_caret(|host| host.move_caret(-1, shift)),
            KeyCode::Right => self.move_caret(|host| host.move_caret(1, shift)),
            KeyCode::Up => self.move_caret(|host| host.move_caret_vertical(-1, shift)),
            KeyCode::Down => self.move_caret(|host| host.move_caret_vertical(1, shift)),
            KeyCode::Enter => {
                let press = if shift {
                    KeyPress::with_shift(Key::Enter)
                } else {
                    KeyPress::new(Key::Enter)
                };
                self.editor.dispatch(EditorEvent::Key(press));
            }
            KeyCode::Backspace => {
                if self.press(Key::Backspace) == EventOutcome::PassThrough {
                    self.editor.host_mut().delete_backward();
                }
            }
            KeyCode::Delete => {
                if self.press(Key::Delete) == EventOutcome::PassThrough {
                    self.editor.host_mut().delete_forward();
                }
            }
            KeyCode::Char(ch) if !ctrl => {
                if self.press(Key::Char(ch)) == EventOutcome::PassThrough {
                    self.editor.host_mut().insert_text(&ch.to_string());
                }
            }
            _ => {}
        }
        true
    }

    fn press(&mut self, key: Key) -> EventOutcome {
        self.editor.dispatch(EditorEvent::Key(KeyPress::new(key)))
    }

    fn move_caret(&mut self, movement: impl FnOnce(&mut MemorySurface) -> bool) {
        if movement(self.editor.host_mut()) {
            self.editor.dispatch(EditorEvent::SelectionChange);
        }
    }

    fn inline(&mut self, marker: InlineMarker) {
        if self.editor.apply_inline(marker).is_handled() {
            self.editor.render();
            self.editor.after_paint();
        } else {
            self.status = "Select text inside one block to format it".to_string();
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let area = self.content_area;
        if mouse.column < area.x
            || mouse.row < area.y
            || mouse.column >= area.x + area.width
            || mouse.row >= area.y + area.height
        {
            return;
        }

        let x = f64::from(mouse.column - area.x);
        let y = (usize::from(mouse.row - area.y) + self.scroll) as f64;
        let outcome = self.editor.dispatch(EditorEvent::PointerDown { x, y });
        if outcome == EventOutcome::PassThrough && self.editor.host_mut().place_caret_at_point(x, y)
        {
            self.editor.dispatch(EditorEvent::SelectionChange);
        }
    }

    /// Keep the caret row inside the visible window
    fn follow_caret(&mut self, height: usize) {
        let Some((_, row)) = self.editor.host().caret_screen_position() else {
            return;
        };
        if row < self.scroll {
            self.scroll = row;
        } else if height > 0 && row >= self.scroll + height {
            self.scroll = row + 1 - height;
        }
    }
}

fn main() -> Result<()> {
    // Determine the file from CLI args or config file
    let args: Vec<String> = env::args().collect();
    let config_path = Config::config_path();

    let (config, first_run) = match Config::load() {
        Ok(Some(config)) => (config, false),
        Ok(None) => (Config::default(), true),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let level = config
        .editor
        .log_level
        .parse()
        .unwrap_or(LevelFilter::Warn);
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let file_path = match args.len() {
        2 => PathBuf::from(&args[1]),
        1 => match config.default_file.clone() {
            Some(path) => {
                log::info!("Using file from config: {}", path.display());
                path
            }
            None => {
                eprintln!("Error: No file provided and no default_file configured");
                eprintln!("Usage: {} <file.md>", args[0]);
                eprintln!("Or set default_file in {}", config_path.display());
                process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage: {} [file.md]", args[0]);
            process::exit(1);
        }
    };

    if first_run {
        remember_default_file(config.clone(), &file_path, &config_path);
    }

    let settings = EditorSettings {
        continue_lists: config.editor.continue_lists,
        bookmark_prefix: config.editor.bookmark_prefix.clone(),
    };
    let mut app = App::new(file_path, settings)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

/// Write a config naming the file opened on first run, so later runs can
/// start without an argument
fn remember_default_file(mut config: Config, file_path: &Path, config_path: &Path) {
    let default_file = match std::path::absolute(file_path) {
        Ok(path) => path,
        Err(e) => {
            log::warn!("Not saving config, cannot resolve {}: {e}", file_path.display());
            return;
        }
    };
    config.default_file = Some(default_file);

    match config.save_to_path(config_path) {
        Ok(()) => log::info!("Config saved to {}", config_path.display()),
        Err(e) => log::warn!("Failed to save config: {e:#}"),
    }
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if !app.handle_key(key) {
                    return Ok(());
                }
            }
            Event::Mouse(mouse) => app.handle_mouse(mouse),
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(f.area());

    let title = format!(" {} ", app.file_path.display());
    let panel = Block::default().borders(Borders::ALL).title(title);
    let inner = panel.inner(chunks[0]);
    app.content_area = inner;
    app.follow_caret(usize::from(inner.height));

    let lines: Vec<Line> = app
        .editor
        .host()
        .rows()
        .iter()
        .skip(app.scroll)
        .map(row_line)
        .collect();

    let content = Paragraph::new(lines).block(panel);
    f.render_widget(content, chunks[0]);

    if let Some((column, row)) = app.editor.host().caret_screen_position()
        && row >= app.scroll
    {
        let x = inner.x + column.min(usize::from(inner.width.saturating_sub(1))) as u16;
        let y = inner.y + (row - app.scroll) as u16;
        if y < inner.y + inner.height {
            f.set_cursor_position((x, y));
        }
    }

    let help_text = if app.status.is_empty() {
        Line::from(vec![
            Span::raw("Esc: Quit | "),
            Span::raw("Ctrl-S: Save | "),
            Span::raw("Ctrl-B: Bold | "),
            Span::raw("Ctrl-E: Italic | "),
            Span::raw("Shift+Enter: Line break"),
        ])
    } else {
        Line::from(Span::styled(
            app.status.clone(),
            Style::default().fg(Color::Yellow),
        ))
    };
    f.render_widget(Paragraph::new(help_text), chunks[1]);
}

fn row_line(row: &SurfaceRow) -> Line<'static> {
    let text: String = row
        .text
        .chars()
        .filter(|&ch| ch != PLACEHOLDER)
        .map(|ch| if ch == NBSP { ' ' } else { ch })
        .collect();

    let style = match row.view {
        Some(ViewKind::Source) => Style::default(),
        Some(ViewKind::Rendered) => Style::default().fg(Color::Gray),
        Some(ViewKind::Bookmark) => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
        None => Style::default(),
    };
    Line::from(Span::styled(text, style))
}
