//! Main application loop for the console.
//!
//! The loop runs on the calling thread inside a tokio runtime context. The
//! orchestrator's tasks run on the runtime's workers and push updates that
//! the loop drains between frames.

use super::input::{Action, InputHandler};
use super::state::{View, ViewState};
use crate::aggregate::{
    Aggregate, AggregateUpdate, DegradedSignal, Generation, Stage, TotalFailureSignal,
};
use crate::collection::{PreprocessParams, SortStableCollection};
use crate::config::{Config, Theme};
use crate::context::AppContext;
use crate::error::{BasilError, Result};
use crate::orchestrator::Orchestrator;
use crate::resource::{Resource, ResourceKind};

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Tabs, Wrap};
use ratatui::{Frame, Terminal};
use std::collections::HashMap;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Progress of one tab's data.
#[derive(Debug, Clone)]
pub enum TabStatus {
    /// Never loaded.
    Idle,
    /// A load is running and nothing has arrived yet.
    Loading,
    /// Some connections have reported.
    Partial {
        /// Connections reported so far.
        reported: usize,
        /// Connections queried.
        expected: usize,
    },
    /// The last load finished.
    Final {
        /// Connections queried.
        expected: usize,
        /// Failed or missing connections, if any.
        degraded: Option<DegradedSignal>,
    },
    /// Every connection failed on the last load.
    Failed(TotalFailureSignal),
}

/// The interactive console.
pub struct App {
    ctx: Arc<AppContext>,
    orchestrator: Orchestrator,
    updates: UnboundedReceiver<AggregateUpdate>,
    collections: HashMap<ResourceKind, SortStableCollection>,
    status: HashMap<ResourceKind, TabStatus>,
    pending: HashMap<ResourceKind, Generation>,
    state: ViewState,
    input: InputHandler,
    theme: Theme,
    last_refresh: Option<Instant>,
    message: Option<String>,
    config_path: Option<PathBuf>,
}

impl App {
    /// Creates the console and its orchestrator.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let (orchestrator, updates) = ctx.spawn_orchestrator();
        let collections = ResourceKind::ALL
            .iter()
            .map(|&kind| (kind, SortStableCollection::new(kind)))
            .collect();
        let status = ResourceKind::ALL.iter().map(|&kind| (kind, TabStatus::Idle)).collect();
        let input = InputHandler::new(ctx.settings().vim_keys);
        let theme = ctx.settings().theme.clone();

        Self {
            ctx,
            orchestrator,
            updates,
            collections,
            status,
            pending: HashMap::new(),
            state: ViewState::new(),
            input,
            theme,
            last_refresh: None,
            message: None,
            config_path: None,
        }
    }

    /// Sets the file that [`Action::ReloadConfig`] re-reads.
    #[must_use]
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Runs the application main loop.
    ///
    /// # Errors
    ///
    /// Returns an error if terminal setup or rendering fails.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout());
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        disable_raw_mode()?;
        stdout().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let poll_timeout = Duration::from_millis(100);

        loop {
            if self.refresh_due() {
                self.refresh_all();
            }
            self.drain_updates();

            terminal.draw(|frame| self.render(frame))?;

            if event::poll(poll_timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        let action = self.input.handle_key(key);
                        self.handle_action(action);
                    }
                }
            }

            if self.state.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn refresh_due(&self) -> bool {
        self.last_refresh
            .map_or(true, |at| at.elapsed() >= self.ctx.refresh_interval())
    }

    /// Starts a load of every resource kind, superseding any still running.
    pub fn refresh_all(&mut self) {
        self.last_refresh = Some(Instant::now());
        for kind in ResourceKind::ALL {
            self.refresh(kind);
        }
    }

    fn refresh(&mut self, kind: ResourceKind) {
        match self
            .orchestrator
            .load(kind, self.ctx.snapshot(), self.ctx.load_timeout())
        {
            Ok(generation) => {
                self.pending.insert(kind, generation);
                if !matches!(self.status.get(&kind), Some(TabStatus::Partial { .. })) {
                    self.status.insert(kind, TabStatus::Loading);
                }
            }
            Err(e) => {
                warn!(%kind, error = %e, "could not start load");
                self.message = Some(e.to_string());
            }
        }
    }

    /// Re-reads the configuration file and swaps its connections into the
    /// context. Loads already running keep the set they started with; the
    /// refresh that follows supersedes them. On error the live set stays.
    pub fn reload_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            self.message = Some("no configuration file to reload".to_string());
            return;
        };

        let result = Config::load(&path)
            .and_then(|config| self.ctx.reconfigure(&config.connections).map_err(BasilError::from));
        match result {
            Ok(set) => {
                info!(path = %path.display(), connections = set.len(), "configuration reloaded");
                self.message = None;
                self.state.clamp(View::Connections, set.len());
                self.refresh_all();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "configuration reload failed");
                self.message = Some(format!("config reload failed: {e}"));
            }
        }
    }

    fn cancel_pending(&mut self) {
        for (_, generation) in self.pending.drain() {
            let _ = self.orchestrator.cancel(generation);
        }
    }

    /// Applies every update that has arrived so far.
    pub fn drain_updates(&mut self) {
        while let Ok(update) = self.updates.try_recv() {
            self.apply_update(update);
        }
    }

    /// Applies one update. Updates from a generation this console is no
    /// longer waiting for are ignored.
    pub fn apply_update(&mut self, update: AggregateUpdate) {
        let kind = update.kind;
        if self.pending.get(&kind) != Some(&update.generation) {
            debug!(generation = update.generation, %kind, "ignoring update for old generation");
            return;
        }

        let status = match (&update.stage, &update.aggregate) {
            (Stage::Partial, _) => TabStatus::Partial {
                reported: update.reported,
                expected: update.expected,
            },
            (Stage::Final, Aggregate::TotalFailure(signal)) => TabStatus::Failed(signal.clone()),
            (Stage::Final, Aggregate::Success { degraded, .. }) => TabStatus::Final {
                expected: update.expected,
                degraded: degraded.clone(),
            },
        };
        if update.is_final() {
            self.pending.remove(&kind);
        }
        self.status.insert(kind, status);
        self.reload(kind, update.aggregate.into_resources());
    }

    fn reload(&mut self, kind: ResourceKind, resources: Vec<Resource>) {
        match kind {
            ResourceKind::Entity => {
                if let Some(mut entities) = self.collections.remove(&ResourceKind::Entity) {
                    let events = self
                        .collections
                        .get(&ResourceKind::Event)
                        .map(SortStableCollection::resources);
                    entities.reload(resources, &PreprocessParams { events });
                    self.collections.insert(ResourceKind::Entity, entities);
                }
            }
            ResourceKind::Event => {
                if let Some(events) = self.collections.get_mut(&ResourceKind::Event) {
                    events.reload(resources, &PreprocessParams::default());
                }
                if let Some(mut entities) = self.collections.remove(&ResourceKind::Entity) {
                    let events = self
                        .collections
                        .get(&ResourceKind::Event)
                        .map(SortStableCollection::resources);
                    entities.reprocess(&PreprocessParams { events });
                    self.collections.insert(ResourceKind::Entity, entities);
                }
            }
            _ => {
                if let Some(collection) = self.collections.get_mut(&kind) {
                    collection.reload(resources, &PreprocessParams::default());
                }
            }
        }

        let len = self.collections.get(&kind).map_or(0, SortStableCollection::len);
        self.state.clamp(View::Resources(kind), len);
    }

    fn current_len(&self) -> usize {
        match self.state.view {
            View::Resources(kind) => {
                self.collections.get(&kind).map_or(0, SortStableCollection::len)
            }
            View::Connections => self.ctx.snapshot().len(),
        }
    }

    /// Handles an input action.
    pub fn handle_action(&mut self, action: Action) {
        let len = self.current_len();
        match action {
            Action::Quit => self.state.quit(),
            Action::Up => self.state.prev_row(len),
            Action::Down => self.state.next_row(len),
            Action::Top => self.state.first_row(),
            Action::Bottom => self.state.last_row(len),
            Action::Select => self.state.show_detail = len > 0,
            Action::Back => self.state.show_detail = false,
            Action::Show(view) => self.state.select_view(view),
            Action::Refresh => self.refresh_all(),
            Action::ReloadConfig => self.reload_config(),
            Action::GrowSplit => self.state.grow_split(),
            Action::ShrinkSplit => self.state.shrink_split(),
            Action::Sort(column) => {
                if let Some(c) = self.current_collection_mut() {
                    c.user_sort(column);
                }
            }
            Action::ClearSort => {
                if let Some(c) = self.current_collection_mut() {
                    c.clear_sort();
                }
            }
            Action::None => {}
        }
    }

    fn current_collection_mut(&mut self) -> Option<&mut SortStableCollection> {
        let kind = self.state.view.kind()?;
        self.collections.get_mut(&kind)
    }

    /// The collection behind a resource tab.
    #[must_use]
    pub fn collection(&self, kind: ResourceKind) -> Option<&SortStableCollection> {
        self.collections.get(&kind)
    }

    /// Progress of a resource tab.
    #[must_use]
    pub fn status(&self, kind: ResourceKind) -> Option<&TabStatus> {
        self.status.get(&kind)
    }

    /// Returns whether the app should quit.
    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.state.should_quit
    }

    /// The active tab.
    #[must_use]
    pub fn view(&self) -> View {
        self.state.view
    }

    /// Renders the application.
    pub fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(1)])
            .split(frame.area());

        self.render_tabs(frame, chunks[0]);

        let body = if self.state.show_detail {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(self.state.split),
                    Constraint::Percentage(100 - self.state.split),
                ])
                .split(chunks[1])
        } else {
            Layout::default()
                .constraints([Constraint::Percentage(100)])
                .split(chunks[1])
        };

        match self.state.view {
            View::Resources(kind) => self.render_resources(frame, body[0], kind),
            View::Connections => self.render_connections(frame, body[0]),
        }
        if self.state.show_detail && body.len() > 1 {
            self.render_detail(frame, body[1]);
        }

        self.render_status(frame, chunks[2]);
    }

    fn block(&self, title: String) -> Block<'static> {
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(ratatui::style::Style::default().fg(self.theme.accent()))
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = View::ALL
            .iter()
            .map(|v| {
                let count = v
                    .kind()
                    .and_then(|k| self.collections.get(&k))
                    .map(|c| format!(" ({})", c.len()))
                    .unwrap_or_default();
                Line::from(format!("{}{count}", v.title()))
            })
            .collect();

        let tabs = Tabs::new(titles)
            .block(self.block(" basil ".to_string()))
            .select(self.state.view.index())
            .highlight_style(self.theme.header());
        frame.render_widget(tabs, area);
    }

    fn render_resources(&self, frame: &mut Frame, area: Rect, kind: ResourceKind) {
        let Some(collection) = self.collections.get(&kind) else {
            return;
        };
        let sort = collection.sort_state();

        let header = Row::new(collection.columns().iter().enumerate().map(|(i, c)| {
            if sort.explicit && sort.column == i {
                Cell::from(format!("{} {}", c.title, sort.direction.arrow()))
            } else {
                Cell::from(c.title)
            }
        }))
        .style(self.theme.header());

        let rows = collection
            .rows()
            .into_iter()
            .zip(collection.resources())
            .map(|(cells, resource)| {
                Row::new(cells).style(self.theme.severity(collection.severity(resource)))
            });

        let widths: Vec<Constraint> = collection
            .columns()
            .iter()
            .map(|c| Constraint::Percentage(c.width))
            .collect();

        let table = Table::new(rows, widths)
            .header(header)
            .block(self.block(format!(" {} ", kind.title())))
            .row_highlight_style(self.theme.selected());

        let selected = (!collection.is_empty()).then(|| self.state.selected());
        let mut table_state = TableState::default().with_selected(selected);
        frame.render_stateful_widget(table, area, &mut table_state);
    }

    fn render_connections(&self, frame: &mut Frame, area: Rect) {
        let set = self.ctx.snapshot();
        let header = Row::new(["Name", "URL", "Namespace", "Auth"]).style(self.theme.header());
        let rows = set.all().iter().map(|c| {
            Row::new([
                c.name.clone(),
                c.endpoint.to_string(),
                c.namespace.clone(),
                c.credential.label().to_string(),
            ])
        });
        let widths = [
            Constraint::Percentage(20),
            Constraint::Percentage(45),
            Constraint::Percentage(20),
            Constraint::Percentage(15),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(self.block(" Connections ".to_string()))
            .row_highlight_style(self.theme.selected());

        let selected = (!set.is_empty()).then(|| self.state.selected());
        let mut table_state = TableState::default().with_selected(selected);
        frame.render_stateful_widget(table, area, &mut table_state);
    }

    fn selected_detail(&self) -> Option<String> {
        let selected = self.state.selected();
        match self.state.view {
            View::Resources(kind) => {
                let resource = self.collections.get(&kind)?.resources().get(selected)?;
                let yaml =
                    serde_yaml_ng::to_string(&resource.item).unwrap_or_else(|e| e.to_string());
                Some(format!("# connection: {}\n{yaml}", resource.connection_name()))
            }
            View::Connections => {
                let set = self.ctx.snapshot();
                let c = set.all().get(selected)?;
                Some(format!(
                    "name: {}\nurl: {}\nnamespace: {}\nauth: {}\n",
                    c.name,
                    c.endpoint,
                    c.namespace,
                    c.credential.label()
                ))
            }
        }
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect) {
        let text = self.selected_detail().unwrap_or_default();
        let detail = Paragraph::new(text)
            .block(self.block(" Detail ".to_string()))
            .wrap(Wrap { trim: false });
        frame.render_widget(detail, area);
    }

    fn status_line(&self) -> Line<'static> {
        if let Some(message) = &self.message {
            return Line::from(Span::styled(message.clone(), self.theme.error()));
        }
        let Some(kind) = self.state.view.kind() else {
            return Line::from(format!("{} connections configured", self.ctx.snapshot().len()));
        };
        let items = self.collections.get(&kind).map_or(0, SortStableCollection::len);

        match self.status.get(&kind) {
            None | Some(TabStatus::Idle) => Line::from("Idle"),
            Some(TabStatus::Loading) => Line::from("Loading..."),
            Some(TabStatus::Partial { reported, expected }) => {
                Line::from(format!(
                    "Loading {reported}/{expected} connections, {items} items so far"
                ))
            }
            Some(TabStatus::Final { expected, degraded: None }) => {
                Line::from(format!("{items} items from {expected} connections"))
            }
            Some(TabStatus::Final { degraded: Some(d), .. }) => Line::from(vec![
                Span::raw(format!("{items} items ")),
                Span::styled(
                    format!("(degraded: {})", d.failed_connections.join(", ")),
                    self.theme.severity(Some(1)),
                ),
            ]),
            Some(TabStatus::Failed(signal)) => {
                let detail = signal
                    .errors
                    .iter()
                    .map(|(name, err)| format!("{name}: {err}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                Line::from(Span::styled(
                    format!("All connections failed. {detail}"),
                    self.theme.error(),
                ))
            }
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Paragraph::new(self.status_line()), area);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{DemoBehaviour, DemoClient};
    use crate::config::{ConnectionEntry, GlobalConfig};
    use crate::connection::ConnectionSet;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    fn app(client: DemoClient) -> App {
        let set = ConnectionSet::build(&[
            ConnectionEntry::with_api_key("prod", "https://prod", "k"),
            ConnectionEntry::with_api_key("dev", "https://dev", "k"),
        ])
        .unwrap();
        App::new(Arc::new(AppContext::new(set, Arc::new(client), GlobalConfig::default())))
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    async fn settle(app: &mut App) {
        tokio::time::sleep(Duration::from_secs(30)).await;
        app.drain_updates();
    }

    #[tokio::test(start_paused = true)]
    async fn test_app_handle_quit() {
        let mut app = app(DemoClient::new());
        assert!(!app.should_quit());
        app.handle_action(Action::Quit);
        assert!(app.should_quit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_loads_every_tab() {
        let mut app = app(DemoClient::new());

        app.refresh_all();
        settle(&mut app).await;

        for kind in ResourceKind::ALL {
            assert!(matches!(app.status(kind), Some(TabStatus::Final { degraded: None, .. })));
            assert!(!app.collection(kind).unwrap().is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entities_get_check_counts_from_events() {
        let mut app = app(DemoClient::new());

        app.refresh_all();
        settle(&mut app).await;

        let entities = app.collection(ResourceKind::Entity).unwrap();
        let first = &entities.resources()[0];
        assert!(entities
            .side_table()
            .check_counts(first.name().unwrap(), first.connection_name())
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_update_is_ignored() {
        let mut app = app(DemoClient::new());
        app.refresh_all();
        settle(&mut app).await;
        let before = app.collection(ResourceKind::Check).unwrap().len();

        app.apply_update(AggregateUpdate {
            generation: 9_999,
            kind: ResourceKind::Check,
            stage: Stage::Final,
            reported: 0,
            expected: 0,
            aggregate: Aggregate::Success {
                resources: Vec::new(),
                degraded: None,
            },
        });

        assert_eq!(app.collection(ResourceKind::Check).unwrap().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_status_rendered() {
        let mut app =
            app(DemoClient::new().with_behaviour("dev", DemoBehaviour::Fail("refused".into())));
        app.refresh_all();
        settle(&mut app).await;

        let text = screen(&app);
        assert!(text.contains("degraded: dev"), "status line missing: {text}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_rendered() {
        let client = DemoClient::new()
            .with_behaviour("dev", DemoBehaviour::Fail("refused".into()))
            .with_behaviour("prod", DemoBehaviour::Fail("refused".into()));
        let mut app = app(client);
        app.refresh_all();
        settle(&mut app).await;

        assert!(matches!(app.status(ResourceKind::Event), Some(TabStatus::Failed(_))));
        assert!(screen(&app).contains("All connections failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_action_and_header_arrow() {
        let mut app = app(DemoClient::new().with_behaviour(
            "prod",
            DemoBehaviour::Fixed(vec![
                json!({"metadata": {"name": "b"}}),
                json!({"metadata": {"name": "a"}}),
            ]),
        ));
        app.handle_action(Action::Show(View::Resources(ResourceKind::Check)));
        app.refresh_all();
        settle(&mut app).await;

        app.handle_action(Action::Sort(1));
        app.handle_action(Action::Sort(1));

        let checks = app.collection(ResourceKind::Check).unwrap();
        assert!(checks.sort_state().explicit);
        assert!(screen(&app).contains("Name ▼"));

        app.handle_action(Action::ClearSort);
        assert!(!app.collection(ResourceKind::Check).unwrap().sort_state().explicit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detail_pane_and_connections_tab() {
        let mut app = app(DemoClient::new());
        app.refresh_all();
        settle(&mut app).await;

        app.handle_action(Action::Select);
        assert!(screen(&app).contains("# connection:"));

        app.handle_action(Action::Back);
        app.handle_action(Action::Show(View::Connections));
        let text = screen(&app);
        assert!(text.contains("https://prod:443"));
        assert!(text.contains("api key"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_config_swaps_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::new();
        config.connections = vec![ConnectionEntry::with_api_key("lab", "https://lab", "k")];
        config.save(&path).unwrap();

        let mut app = app(DemoClient::new()).with_config_path(path);
        app.handle_action(Action::ReloadConfig);
        settle(&mut app).await;

        assert_eq!(app.ctx.snapshot().names().collect::<Vec<_>>(), vec!["lab"]);
        let events = app.collection(ResourceKind::Event).unwrap();
        assert!(!events.is_empty());
        assert!(events.resources().iter().all(|r| r.connection_name() == "lab"));

        app.handle_action(Action::Show(View::Connections));
        assert!(screen(&app).contains("https://lab:443"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_config_keeps_live_set_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "connections:\n  - name: broken\n    url: https://broken\n").unwrap();

        let mut app = app(DemoClient::new()).with_config_path(path);
        app.handle_action(Action::ReloadConfig);

        assert_eq!(app.ctx.snapshot().len(), 2);
        assert!(screen(&app).contains("config reload failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_config_without_path() {
        let mut app = app(DemoClient::new());
        app.handle_action(Action::ReloadConfig);

        assert_eq!(app.ctx.snapshot().len(), 2);
        assert!(screen(&app).contains("no configuration file to reload"));
    }
}
