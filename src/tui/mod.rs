//! Terminal user interface.
//!
//! The app only maps keys to session calls and draws whatever the session
//! holds; all lifecycle decisions live in [`crate::chat`].

mod input;
mod picker;
mod terminal;
mod ui;

pub use input::InputLine;
pub use picker::{PickerState, SubtitlePicker};

use crate::backend::BackendFactory;
use crate::chat::{ChatSession, ChatStatus, MessageHandler, SendRefusal, SessionOptions};
use crate::error::Result as VidchatResult;
use crate::subtitle::{SubtitleListing, SubtitleSource};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use terminal::{EventHandler, TerminalEvent};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Messages from helper tasks to the UI loop.
enum AppMessage {
    Listing(VidchatResult<SubtitleListing>),
    Quit,
}

/// What the header shows.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub url: String,
    pub model_label: String,
}

pub struct App {
    pub session: ChatSession,
    pub picker: SubtitlePicker,
    pub input: InputLine,
    pub info: AppInfo,
    /// Spinner frame, advanced on every tick.
    pub spinner: usize,
    /// Lines scrolled up from the bottom of the chat log.
    pub scroll_back: u16,
    /// Transient notice shown in the footer.
    pub notice: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(session: ChatSession, info: AppInfo) -> Self {
        Self {
            session,
            picker: SubtitlePicker::new(),
            input: InputLine::new(),
            info,
            spinner: 0,
            scroll_back: 0,
            notice: None,
            should_quit: false,
        }
    }

    fn on_terminal_event(&mut self, event: TerminalEvent) {
        match event {
            TerminalEvent::Key(key) => self.on_key(key),
            TerminalEvent::Paste(text) => {
                if self.accepts_input() {
                    self.input.insert_str(&text);
                }
            }
            TerminalEvent::Resize(_, _) => {}
            TerminalEvent::Tick => self.spinner = self.spinner.wrapping_add(1),
        }
    }

    fn accepts_input(&self) -> bool {
        matches!(
            self.session.status(),
            ChatStatus::ChatReady | ChatStatus::ChatActive
        )
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        let result = match self.session.status() {
            ChatStatus::Started | ChatStatus::SubtitleDownloaded => self.on_picker_key(key),
            ChatStatus::ChatInitFailed => match key.code {
                KeyCode::Enter | KeyCode::Char('r') => self.session.retry(),
                KeyCode::Esc | KeyCode::Char('q') => {
                    self.should_quit = true;
                    Ok(())
                }
                _ => Ok(()),
            },
            ChatStatus::ChatReady | ChatStatus::ChatActive => {
                self.on_chat_key(key);
                Ok(())
            }
            ChatStatus::SubtitleSelected | ChatStatus::ChatInitializing => Ok(()),
        };

        if let Err(e) = result {
            error!("Key handling failed: {}", e);
            self.notice = Some(e.to_string());
        }
    }

    fn on_picker_key(&mut self, key: KeyEvent) -> VidchatResult<()> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.picker.previous(),
            KeyCode::Down | KeyCode::Char('j') => self.picker.next(),
            KeyCode::Enter => {
                if let Some(subtitle) = self.picker.selected().cloned() {
                    self.session.select_subtitle(subtitle)?;
                }
            }
            KeyCode::Char('r') if self.session.status() == ChatStatus::SubtitleDownloaded => {
                self.session.retry()?;
            }
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
        Ok(())
    }

    fn on_chat_key(&mut self, key: KeyEvent) {
        let suggesting = !self.input.suggestions().is_empty();
        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Tab => {
                self.input.complete();
            }
            KeyCode::Up if suggesting => self.input.select_prev_suggestion(),
            KeyCode::Down if suggesting => self.input.select_next_suggestion(),
            KeyCode::Up | KeyCode::PageUp => self.scroll_back = self.scroll_back.saturating_add(3),
            KeyCode::Down | KeyCode::PageDown => {
                self.scroll_back = self.scroll_back.saturating_sub(3)
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            KeyCode::Char(c) => self.input.insert(c),
            _ => {}
        }
    }

    fn submit(&mut self) {
        let Some(text) = self.input.submission() else {
            return;
        };
        match self.session.submit(&text) {
            Ok(()) => {
                self.input.clear();
                self.scroll_back = 0;
                self.notice = None;
            }
            // Text stays in the input until the reply is done.
            Err(SendRefusal::Busy) => {}
            Err(refusal) => self.notice = Some(format!("Cannot send yet ({:?})", refusal)),
        }
    }
}

/// Run the interactive UI until the user quits.
pub async fn run(
    info: AppInfo,
    source: Arc<dyn SubtitleSource>,
    factory: Arc<dyn BackendFactory>,
    handler: MessageHandler,
    options: SessionOptions,
) -> Result<()> {
    let (app_tx, mut app_rx) = mpsc::unbounded_channel();

    let quit_tx = app_tx.clone();
    let handler = handler.with_exit_handler(Arc::new(move || {
        let _ = quit_tx.send(AppMessage::Quit);
    }));
    let session = ChatSession::new(
        info.url.clone(),
        Arc::clone(&source),
        factory,
        handler,
        options,
    );
    let mut app = App::new(session, info);

    let url = app.info.url.clone();
    tokio::spawn(async move {
        let listing = source.available_subtitles(&url).await;
        let _ = app_tx.send(AppMessage::Listing(listing));
    });

    terminal::install_panic_hook();
    let mut tui = terminal::init()?;
    let mut events = EventHandler::new();
    info!("UI started");

    let result = event_loop(&mut tui, &mut app, &mut events, &mut app_rx).await;

    terminal::restore()?;
    info!("UI stopped");
    result
}

async fn event_loop(
    tui: &mut terminal::Tui,
    app: &mut App,
    events: &mut EventHandler,
    app_rx: &mut mpsc::UnboundedReceiver<AppMessage>,
) -> Result<()> {
    loop {
        tui.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => app.on_terminal_event(event),
            Some(event) = app.session.next_event() => {
                if let Err(e) = app.session.apply(event) {
                    error!("Session update failed: {}", e);
                    app.notice = Some(e.to_string());
                }
            }
            Some(message) = app_rx.recv() => match message {
                AppMessage::Listing(listing) => app.picker.load(listing),
                AppMessage::Quit => app.should_quit = true,
            },
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
