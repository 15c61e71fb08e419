use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use parley_core::{
    guard, AuthFlow, ChatBackend, ChatController, ClientResult, RegistrationResult, Route,
    Session, SessionStore, Task, TaskResult,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Results coming back from spawned work
#[derive(Debug)]
pub enum AppEvent {
    Task(TaskResult),
    LoggedIn(ClientResult<Session>),
    Registered(ClientResult<RegistrationResult>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Sidebar,
}

/// Email/password form shared by the login and register screens
#[derive(Debug, Clone)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub focus: Field,
    pub error: Option<String>,
    pub info: Option<String>,
    pub submitting: bool,
}

impl Default for AuthForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            focus: Field::Email,
            error: None,
            info: None,
            submitting: false,
        }
    }
}

impl AuthForm {
    fn active_field(&mut self) -> &mut String {
        match self.focus {
            Field::Email => &mut self.email,
            Field::Password => &mut self.password,
        }
    }

    fn toggle_field(&mut self) {
        self.focus = match self.focus {
            Field::Email => Field::Password,
            Field::Password => Field::Email,
        };
    }

    fn edit(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => self.toggle_field(),
            KeyCode::Char(c) => {
                self.active_field().push(c);
                self.error = None;
            }
            KeyCode::Backspace => {
                self.active_field().pop();
            }
            _ => {}
        }
    }
}

pub struct App {
    pub route: Route,
    pub server_url: String,
    pub controller: ChatController,
    pub login: AuthForm,
    pub register: AuthForm,
    pub input: String,
    pub focus: Focus,
    pub show_sidebar: bool,
    pub confirm_logout: bool,
    /// Lines scrolled up from the bottom of the message pane
    pub scroll_offset: u16,
    pub tick: usize,
    auth: AuthFlow,
    session: SessionStore,
    tx: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        server_url: &str,
        backend: Arc<dyn ChatBackend>,
        session: SessionStore,
        tx: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            route: guard(Route::Chat, &session),
            server_url: server_url.to_string(),
            controller: ChatController::new(Arc::clone(&backend), session.clone()),
            login: AuthForm::default(),
            register: AuthForm::default(),
            input: String::new(),
            focus: Focus::Input,
            show_sidebar: true,
            confirm_logout: false,
            scroll_offset: 0,
            tick: 0,
            auth: AuthFlow::new(backend, session.clone()),
            session,
            tx,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Kick off whatever the initial route needs
    pub fn start(&mut self) {
        if self.route == Route::Chat {
            self.load_conversations();
        }
    }

    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn navigate(&mut self, requested: Route) {
        let route = guard(requested, &self.session);
        if route != self.route {
            debug!("Route {} -> {}", self.route.path(), route.path());
            self.route = route;
        }
    }

    /// React to the session being set or cleared anywhere
    pub fn on_session_changed(&mut self) {
        let route = guard(self.route, &self.session);
        if route == self.route {
            return;
        }

        match route {
            Route::Chat => {
                self.route = Route::Chat;
                self.login = AuthForm::default();
                self.load_conversations();
            }
            Route::Login | Route::Register => {
                let expired = !self.confirm_logout;
                self.route = Route::Login;
                self.controller.reset();
                self.input.clear();
                self.focus = Focus::Input;
                self.confirm_logout = false;
                self.scroll_offset = 0;
                if expired {
                    self.login.error = Some("Session expired, please log in again".to_string());
                }
            }
        }
    }

    pub fn on_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Task(result) => match self.controller.apply(result) {
                Ok(Some(next)) => self.spawn(next),
                Ok(None) => {}
                // Already on the notification bar, or handled by the session watcher
                Err(e) => debug!("Task failed: {}", e),
            },
            AppEvent::LoggedIn(result) => {
                self.login.submitting = false;
                match result {
                    Ok(_) => self.login.password.clear(),
                    Err(e) => self.login.error = Some(e.to_string()),
                }
            }
            AppEvent::Registered(result) => {
                self.register.submitting = false;
                match result {
                    Ok(registered) => {
                        self.login = AuthForm {
                            email: std::mem::take(&mut self.register.email),
                            info: Some(format!("{}. Please log in.", registered.message)),
                            focus: Field::Password,
                            ..AuthForm::default()
                        };
                        self.register = AuthForm::default();
                        self.navigate(Route::Login);
                    }
                    Err(e) => self.register.error = Some(e.to_string()),
                }
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Flow {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        match self.route {
            Route::Login => self.handle_login_key(key, ctrl),
            Route::Register => self.handle_register_key(key),
            Route::Chat => self.handle_chat_key(key, ctrl),
        }
        Flow::Continue
    }

    fn handle_login_key(&mut self, key: KeyEvent, ctrl: bool) {
        match key.code {
            KeyCode::Char('r') if ctrl => {
                self.register = AuthForm::default();
                self.navigate(Route::Register);
            }
            KeyCode::Enter => self.submit_login(),
            _ => self.login.edit(key),
        }
    }

    fn handle_register_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.navigate(Route::Login),
            KeyCode::Enter => self.submit_register(),
            _ => self.register.edit(key),
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent, ctrl: bool) {
        if self.confirm_logout {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    info!("Logging out");
                    self.auth.logout();
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.confirm_logout = false;
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('n') if ctrl => self.new_conversation(),
            KeyCode::Char('b') if ctrl => {
                self.show_sidebar = !self.show_sidebar;
                if !self.show_sidebar {
                    self.focus = Focus::Input;
                }
            }
            KeyCode::Char('l') if ctrl => self.confirm_logout = true,
            KeyCode::Char('p') if ctrl => self.move_selection(-1),
            KeyCode::Char('j') if ctrl => self.move_selection(1),
            KeyCode::Esc => {
                if self.controller.notice().is_some() {
                    self.controller.dismiss_notice();
                } else {
                    self.focus = Focus::Input;
                }
            }
            KeyCode::Tab if self.show_sidebar => {
                self.focus = match self.focus {
                    Focus::Input => Focus::Sidebar,
                    Focus::Sidebar => Focus::Input,
                };
            }
            KeyCode::Up if self.focus == Focus::Sidebar => self.move_selection(-1),
            KeyCode::Down if self.focus == Focus::Sidebar => self.move_selection(1),
            KeyCode::Up => self.scroll_offset = self.scroll_offset.saturating_add(1),
            KeyCode::Down => self.scroll_offset = self.scroll_offset.saturating_sub(1),
            KeyCode::PageUp => self.scroll_offset = self.scroll_offset.saturating_add(10),
            KeyCode::PageDown => self.scroll_offset = self.scroll_offset.saturating_sub(10),
            KeyCode::Enter if self.focus == Focus::Sidebar => self.focus = Focus::Input,
            KeyCode::Enter => self.send_message(),
            KeyCode::Char(c) if self.focus == Focus::Input && !ctrl => self.input.push(c),
            KeyCode::Backspace if self.focus == Focus::Input => {
                self.input.pop();
            }
            _ => {}
        }
    }

    fn submit_login(&mut self) {
        if self.login.submitting {
            return;
        }
        self.login.submitting = true;
        self.login.error = None;
        self.login.info = None;

        let auth = self.auth.clone();
        let tx = self.tx.clone();
        let email = self.login.email.clone();
        let password = self.login.password.clone();
        tokio::spawn(async move {
            let result = auth.login(&email, &password).await;
            let _ = tx.send(AppEvent::LoggedIn(result));
        });
    }

    fn submit_register(&mut self) {
        if self.register.submitting {
            return;
        }
        self.register.submitting = true;
        self.register.error = None;

        let auth = self.auth.clone();
        let tx = self.tx.clone();
        let email = self.register.email.clone();
        let password = self.register.password.clone();
        tokio::spawn(async move {
            let result = auth.register(&email, &password).await;
            let _ = tx.send(AppEvent::Registered(result));
        });
    }

    fn load_conversations(&mut self) {
        let task = self.controller.begin_load();
        self.spawn(task);
    }

    fn new_conversation(&mut self) {
        let task = self.controller.begin_create();
        self.spawn(task);
        self.focus = Focus::Input;
        self.scroll_offset = 0;
    }

    fn send_message(&mut self) {
        if let Some(task) = self.controller.begin_send(&self.input) {
            self.input.clear();
            self.scroll_offset = 0;
            self.spawn(task);
        }
    }

    /// Step through the sidebar, wrapping at both ends
    fn move_selection(&mut self, step: isize) {
        let ids: Vec<String> = self
            .controller
            .conversations()
            .map(|c| c.id.clone())
            .collect();
        if ids.is_empty() {
            return;
        }

        let len = ids.len() as isize;
        let next: isize = match self
            .controller
            .current()
            .and_then(|current| ids.iter().position(|id| id == current))
        {
            Some(index) => (index as isize + step).rem_euclid(len),
            None => 0,
        };

        match self.controller.select(Some(&ids[next as usize])) {
            Ok(Some(task)) => self.spawn(task),
            Ok(None) => {}
            Err(e) => warn!("Selection failed: {}", e),
        }
        self.scroll_offset = 0;
    }

    fn spawn(&self, task: Task) {
        let backend = self.controller.backend();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = task.run(backend).await;
            let _ = tx.send(AppEvent::Task(result));
        });
    }
}
