use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use finance_dashboard::{
    format_amount, Account, AccountDraft, Category, CategoryDraft, ConfirmGate, Dashboard,
    DialogPrompt, EntityPage, Notification, NotificationLevel, Notifier, QueryState,
    RecordingNotifier, Resource, RouterClient, SelectGate, Summary, Transaction,
    TransactionFilter, TransactionFormValues, WizardView,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Sparkline, Table, TableState},
    Frame, Terminal,
};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

type Api = RouterClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Transactions,
    Accounts,
    Categories,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Transactions,
            Page::Transactions => Page::Accounts,
            Page::Accounts => Page::Categories,
            Page::Categories => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Categories,
            Page::Transactions => Page::Overview,
            Page::Accounts => Page::Transactions,
            Page::Categories => Page::Accounts,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Transactions => "Transactions",
            Page::Accounts => "Accounts",
            Page::Categories => "Categories",
        }
    }
}

/// What the one-line text input is collecting
#[derive(Debug, Clone, PartialEq, Eq)]
enum InputKind {
    NewAccount,
    RenameAccount(String),
    NewCategory,
    RenameCategory(String),
    UploadPath,
    /// `date | payee | amount | notes` for the given account
    NewTransaction { account_id: String },
    /// Same line format, prefilled from the highlighted transaction
    EditTransaction { id: String, base: TransactionFormValues },
}

impl InputKind {
    fn title(&self) -> &str {
        match self {
            InputKind::NewAccount => "New account name",
            InputKind::RenameAccount(_) => "Rename account",
            InputKind::NewCategory => "New category name",
            InputKind::RenameCategory(_) => "Rename category",
            InputKind::UploadPath => "File to import (.csv / .xlsx)",
            InputKind::NewTransaction { .. } => "date | payee | amount | notes",
            InputKind::EditTransaction { .. } => "Edit: date | payee | amount | notes",
        }
    }
}

struct Input {
    kind: InputKind,
    buffer: String,
}

/// A gate waiting for the user
enum Modal {
    Confirm(ConfirmGate, DialogPrompt),
    Select(SelectGate, DialogPrompt),
}

pub struct App {
    dashboard: Arc<Dashboard<Api>>,
    notifier: Arc<RecordingNotifier>,
    runtime: Handle,
    pub current_page: Page,
    transactions_state: TableState,
    accounts_state: TableState,
    categories_state: TableState,
    input: Option<Input>,
    import_column: usize,
    select_index: usize,
}

impl App {
    pub fn new(dashboard: Arc<Dashboard<Api>>, notifier: Arc<RecordingNotifier>, runtime: Handle) -> Self {
        let mut app = Self {
            dashboard,
            notifier,
            runtime,
            current_page: Page::Overview,
            transactions_state: TableState::default(),
            accounts_state: TableState::default(),
            categories_state: TableState::default(),
            input: None,
            import_column: 0,
            select_index: 0,
        };
        app.refresh();
        app
    }

    /// Run `action` on the runtime; the draw loop picks up the new state
    fn spawn<F, Fut>(&self, action: F)
    where
        F: FnOnce(Arc<Dashboard<Api>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(action(Arc::clone(&self.dashboard)));
    }

    pub fn refresh(&self) {
        self.spawn(|dash| async move { dash.refresh_all().await });
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn table_state(&mut self) -> Option<&mut TableState> {
        match self.current_page {
            Page::Transactions => Some(&mut self.transactions_state),
            Page::Accounts => Some(&mut self.accounts_state),
            Page::Categories => Some(&mut self.categories_state),
            Page::Overview => None,
        }
    }

    fn row_count(&self) -> usize {
        match self.current_page {
            Page::Transactions => self.dashboard.transactions.list().rows().len(),
            Page::Accounts => self.dashboard.accounts.rows().len(),
            Page::Categories => self.dashboard.categories.rows().len(),
            Page::Overview => 0,
        }
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if let Some(state) = self.table_state() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(i) if i + 1 < len => i + 1,
                _ => 0,
            };
            state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if let Some(state) = self.table_state() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(0) | None => len - 1,
                Some(i) => i - 1,
            };
            state.select(Some(i));
        }
    }

    fn highlighted_id(&self) -> Option<String> {
        fn pick<R: Resource>(page: &EntityPage<Api, R>, state: &TableState) -> Option<String> {
            let rows = page.rows();
            state
                .selected()
                .and_then(|i| rows.get(i))
                .map(|row| R::entity_id(row).to_string())
        }

        match self.current_page {
            Page::Transactions => pick(self.dashboard.transactions.list(), &self.transactions_state),
            Page::Accounts => pick(&self.dashboard.accounts, &self.accounts_state),
            Page::Categories => pick(&self.dashboard.categories, &self.categories_state),
            Page::Overview => None,
        }
    }

    /// First pending gate of the visible page
    fn modal(&self) -> Option<Modal> {
        let dash = &self.dashboard;
        let confirm_gates: Vec<&ConfirmGate> = match self.current_page {
            Page::Transactions => vec![
                dash.transactions.list().delete_gate(),
                dash.transactions.list().bulk_delete_gate(),
            ],
            Page::Accounts => vec![dash.accounts.delete_gate(), dash.accounts.bulk_delete_gate()],
            Page::Categories => vec![dash.categories.delete_gate(), dash.categories.bulk_delete_gate()],
            Page::Overview => Vec::new(),
        };

        for gate in confirm_gates {
            if let Some(prompt) = gate.pending() {
                return Some(Modal::Confirm(gate.clone(), prompt));
            }
        }
        let select = dash.transactions.account_gate();
        select
            .pending()
            .map(|prompt| Modal::Select(select.clone(), prompt))
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    fn toggle_highlighted(&self) {
        let Some(id) = self.highlighted_id() else { return };
        match self.current_page {
            Page::Transactions => {
                self.dashboard.transactions.list().toggle_selected(&id);
            }
            Page::Accounts => {
                self.dashboard.accounts.toggle_selected(&id);
            }
            Page::Categories => {
                self.dashboard.categories.toggle_selected(&id);
            }
            Page::Overview => {}
        }
    }

    fn select_all(&self) {
        match self.current_page {
            Page::Transactions => self.dashboard.transactions.list().select_all(),
            Page::Accounts => self.dashboard.accounts.select_all(),
            Page::Categories => self.dashboard.categories.select_all(),
            Page::Overview => {}
        }
    }

    fn delete_highlighted(&self) {
        let Some(id) = self.highlighted_id() else { return };
        let page = self.current_page;
        self.spawn(move |dash| async move {
            let result = match page {
                Page::Transactions => dash.transactions.list().delete_row(&id).await,
                Page::Accounts => dash.accounts.delete_row(&id).await,
                Page::Categories => dash.categories.delete_row(&id).await,
                Page::Overview => Ok(false),
            };
            match result {
                Ok(true) => dash.refresh_all().await,
                Ok(false) => {}
                Err(err) => tracing::warn!("delete failed: {err}"),
            }
        });
    }

    fn delete_selected(&self) {
        let page = self.current_page;
        self.spawn(move |dash| async move {
            let result = match page {
                Page::Transactions => dash.transactions.list().delete_selected().await,
                Page::Accounts => dash.accounts.delete_selected().await,
                Page::Categories => dash.categories.delete_selected().await,
                Page::Overview => Ok(0),
            };
            match result {
                Ok(0) => {}
                Ok(_) => dash.refresh_all().await,
                Err(err) => tracing::warn!("bulk delete failed: {err}"),
            }
        });
    }

    fn open_input(&mut self, kind: InputKind) {
        self.open_input_with(kind, String::new());
    }

    fn open_input_with(&mut self, kind: InputKind, buffer: String) {
        self.input = Some(Input { kind, buffer });
    }

    fn start_new(&mut self) {
        let kind = match self.current_page {
            Page::Accounts => InputKind::NewAccount,
            Page::Categories => InputKind::NewCategory,
            Page::Transactions => {
                let accounts = self.dashboard.accounts.rows();
                let Some(account) = accounts.first() else {
                    self.notifier
                        .notify(Notification::error("Create an account before adding transactions"));
                    return;
                };
                InputKind::NewTransaction {
                    account_id: account.id.clone(),
                }
            }
            Page::Overview => return,
        };
        self.open_input(kind);
    }

    fn start_rename(&mut self) {
        let Some(id) = self.highlighted_id() else { return };
        match self.current_page {
            Page::Accounts => self.open_input(InputKind::RenameAccount(id)),
            Page::Categories => self.open_input(InputKind::RenameCategory(id)),
            Page::Transactions => {
                let rows = self.dashboard.transactions.list().rows();
                let Some(tx) = rows.iter().find(|tx| tx.id == id) else { return };
                let base = TransactionFormValues::from_transaction(tx);
                let line = format!("{} | {} | {} | {}", tx.date, base.payee, base.amount, base.notes);
                self.open_input_with(InputKind::EditTransaction { id, base }, line);
            }
            Page::Overview => {}
        }
    }

    /// Show only the highlighted account's transactions
    fn filter_by_account(&mut self) {
        let Some(id) = self.highlighted_id() else { return };
        self.dashboard
            .transactions
            .list()
            .set_filter(TransactionFilter::for_account(id));
        self.transactions_state.select(None);
        self.current_page = Page::Transactions;
        self.spawn(|dash| async move { dash.transactions.list().refresh().await });
    }

    fn clear_filter(&mut self) {
        self.dashboard.transactions.list().set_filter(TransactionFilter::default());
        self.transactions_state.select(None);
        self.spawn(|dash| async move { dash.transactions.list().refresh().await });
    }

    fn submit_input(&mut self) {
        let Some(input) = self.input.take() else { return };
        let text = input.buffer.trim().to_string();

        match input.kind {
            InputKind::NewAccount => self.spawn(move |dash| async move {
                if dash.accounts.hooks().create(&AccountDraft::new(text)).await.is_ok() {
                    dash.refresh_all().await;
                }
            }),
            InputKind::RenameAccount(id) => self.spawn(move |dash| async move {
                if dash.accounts.hooks().update(&id, &AccountDraft::new(text)).await.is_ok() {
                    dash.refresh_all().await;
                }
            }),
            InputKind::NewCategory => self.spawn(move |dash| async move {
                if dash.categories.hooks().create(&CategoryDraft::new(text)).await.is_ok() {
                    dash.refresh_all().await;
                }
            }),
            InputKind::RenameCategory(id) => self.spawn(move |dash| async move {
                if dash.categories.hooks().update(&id, &CategoryDraft::new(text)).await.is_ok() {
                    dash.refresh_all().await;
                }
            }),
            InputKind::UploadPath => {
                let path = PathBuf::from(text);
                if self.dashboard.transactions.upload_file(&path).is_ok() {
                    self.import_column = 0;
                }
            }
            InputKind::NewTransaction { account_id } => {
                let base = TransactionFormValues {
                    account_id,
                    ..Default::default()
                };
                let values = match transaction_form(&text, base) {
                    Some(values) => values,
                    None => {
                        self.notifier
                            .notify(Notification::error("Expected: date | payee | amount | notes"));
                        return;
                    }
                };
                match values.into_draft() {
                    Ok(draft) => self.spawn(move |dash| async move {
                        if dash.transactions.list().hooks().create(&draft).await.is_ok() {
                            dash.refresh_all().await;
                        }
                    }),
                    Err(err) => self.notifier.notify(Notification::error(err.to_string())),
                }
            }
            InputKind::EditTransaction { id, base } => {
                let Some(values) = transaction_form(&text, base) else {
                    self.notifier
                        .notify(Notification::error("Expected: date | payee | amount | notes"));
                    return;
                };
                match values.into_draft() {
                    Ok(draft) => self.spawn(move |dash| async move {
                        if dash.transactions.list().hooks().update(&id, &draft).await.is_ok() {
                            dash.refresh_all().await;
                        }
                    }),
                    Err(err) => self.notifier.notify(Notification::error(err.to_string())),
                }
            }
        }
    }

    fn submit_import(&self) {
        self.spawn(|dash| async move {
            match dash.transactions.submit_import().await {
                Ok(_) => dash.refresh_all().await,
                Err(err) => tracing::info!("import not submitted: {err}"),
            }
        });
    }

    fn cycle_import_column(&self) {
        let column = self.import_column;
        self.dashboard
            .transactions
            .edit_mapping(|mapping| mapping.cycle(column));
    }

    fn move_import_column(&mut self, forward: bool) {
        let columns = self.dashboard.transactions.wizard().results().column_count();
        if columns == 0 {
            return;
        }
        self.import_column = if forward {
            (self.import_column + 1) % columns
        } else {
            (self.import_column + columns - 1) % columns
        };
    }

    // ------------------------------------------------------------------
    // Key handling. Returns false to quit.
    // ------------------------------------------------------------------

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if let Some(input) = self.input.as_mut() {
            match key.code {
                KeyCode::Enter => self.submit_input(),
                KeyCode::Esc => self.input = None,
                KeyCode::Backspace => {
                    input.buffer.pop();
                }
                KeyCode::Char(c) => input.buffer.push(c),
                _ => {}
            }
            return true;
        }

        if let Some(modal) = self.modal() {
            self.handle_modal_key(modal, key.code);
            return true;
        }

        let importing = self.current_page == Page::Transactions
            && self.dashboard.transactions.view() == WizardView::Import;
        if importing {
            match key.code {
                KeyCode::Left | KeyCode::Char('h') => self.move_import_column(false),
                KeyCode::Right | KeyCode::Char('l') => self.move_import_column(true),
                KeyCode::Char(' ') | KeyCode::Enter => self.cycle_import_column(),
                KeyCode::Char('s') => self.submit_import(),
                KeyCode::Char('c') | KeyCode::Esc => self.dashboard.transactions.cancel_import(),
                KeyCode::Char('q') => return false,
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.previous_page();
                } else {
                    self.next_page();
                }
            }
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Char(' ') => self.toggle_highlighted(),
            KeyCode::Char('a') => self.select_all(),
            KeyCode::Char('d') => self.delete_highlighted(),
            KeyCode::Char('D') => self.delete_selected(),
            KeyCode::Char('n') => self.start_new(),
            KeyCode::Char('e') => self.start_rename(),
            KeyCode::Char('u') if self.current_page == Page::Transactions => {
                self.open_input(InputKind::UploadPath)
            }
            KeyCode::Char('f') if self.current_page == Page::Accounts => self.filter_by_account(),
            KeyCode::Char('F') if self.current_page == Page::Transactions => self.clear_filter(),
            _ => {}
        }
        true
    }

    fn handle_modal_key(&mut self, modal: Modal, code: KeyCode) {
        match modal {
            Modal::Confirm(gate, _) => match code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    gate.accept();
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    gate.cancel();
                }
                _ => {}
            },
            Modal::Select(gate, prompt) => {
                let count = prompt.options.len();
                match code {
                    KeyCode::Down | KeyCode::Char('j') if count > 0 => {
                        self.select_index = (self.select_index + 1) % count;
                    }
                    KeyCode::Up | KeyCode::Char('k') if count > 0 => {
                        self.select_index = (self.select_index + count - 1) % count;
                    }
                    KeyCode::Enter => {
                        if let Some(option) = prompt.options.get(self.select_index) {
                            if let Err(err) = gate.choose(&option.value) {
                                tracing::warn!("selection rejected: {err}");
                            }
                        }
                        self.select_index = 0;
                    }
                    KeyCode::Esc => {
                        gate.dismiss();
                        self.select_index = 0;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Fill `base` from `date | payee | amount | notes`
fn transaction_form(text: &str, base: TransactionFormValues) -> Option<TransactionFormValues> {
    let parts: Vec<&str> = text.split('|').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }
    Some(TransactionFormValues {
        date: chrono::NaiveDate::parse_from_str(parts[0], "%Y-%m-%d").ok(),
        payee: parts[1].to_string(),
        amount: parts[2].to_string(),
        notes: parts.get(3).map(|n| n.to_string()).unwrap_or_default(),
        ..base
    })
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        // background tasks update the pages; poll so they show up
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Overview => render_overview(f, chunks[1], &app.dashboard.summary()),
        Page::Transactions => {
            if app.dashboard.transactions.view() == WizardView::Import {
                render_import(f, chunks[1], app);
            } else {
                render_transactions(f, chunks[1], app);
            }
        }
        Page::Accounts => {
            let page = &app.dashboard.accounts;
            let table = named_table(page, " Accounts ", |a: &Account| a.name.clone());
            f.render_stateful_widget(table, chunks[1], &mut app.accounts_state);
        }
        Page::Categories => {
            let page = &app.dashboard.categories;
            let table = named_table(page, " Categories ", |c: &Category| c.name.clone());
            f.render_stateful_widget(table, chunks[1], &mut app.categories_state);
        }
    }

    render_status_bar(f, chunks[2], app);

    match app.modal() {
        Some(Modal::Confirm(_, prompt)) => render_confirm(f, &prompt),
        Some(Modal::Select(_, prompt)) => render_select(f, &prompt, app.select_index),
        None => {}
    }
    if let Some(input) = &app.input {
        render_input(f, input);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Overview, Page::Transactions, Page::Accounts, Page::Categories];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Finance Dashboard "),
    );

    f.render_widget(header, area);
}

fn amount_style(amount: i64) -> Style {
    if amount < 0 {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn list_block<T>(title: &str, state: &QueryState<T>) -> Block<'static> {
    let title = match state {
        QueryState::Loading => format!("{title}(loading…) "),
        QueryState::Failed(err) => format!("{title}(failed: {err}) "),
        QueryState::Ready(_) => title.to_string(),
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn selection_mark(selected: bool) -> &'static str {
    if selected {
        "[x]"
    } else {
        "[ ]"
    }
}

fn named_table<R: Resource>(
    page: &EntityPage<Api, R>,
    title: &str,
    name: impl Fn(&R::Entity) -> String,
) -> Table<'static> {
    let state = page.state();
    let rows: Vec<Row> = page
        .rows()
        .iter()
        .map(|row| {
            let id = R::entity_id(row);
            Row::new(vec![
                Cell::from(selection_mark(page.is_selected(id))),
                Cell::from(name(row)),
                Cell::from(id.to_string()).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    Table::new(rows, [Constraint::Length(4), Constraint::Min(20), Constraint::Length(38)])
        .header(header_row(&["", "Name", "Id"]))
        .block(list_block(title, &state))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ")
}

fn render_transactions(f: &mut Frame, area: Rect, app: &mut App) {
    let page = app.dashboard.transactions.list();
    let state = page.state();
    let transactions: Vec<Transaction> = page.rows();

    let rows: Vec<Row> = transactions
        .iter()
        .map(|tx| {
            Row::new(vec![
                Cell::from(selection_mark(page.is_selected(&tx.id))),
                Cell::from(tx.date.to_string()),
                Cell::from(truncate(&tx.payee, 30)),
                Cell::from(format_amount(tx.amount)).style(if tx.is_expense() {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::Green)
                }),
                Cell::from(truncate(&tx.account, 18)),
                Cell::from(truncate(tx.category.as_deref().unwrap_or("Uncategorized"), 18)),
                Cell::from(truncate(tx.notes.as_deref().unwrap_or(""), 30)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(12),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(20),
            Constraint::Length(20),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["", "Date", "Payee", "Amount", "Account", "Category", "Notes"]))
    .block(list_block(" Transactions history ", &state))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.transactions_state);
}

fn render_import(f: &mut Frame, area: Rect, app: &App) {
    let wizard = app.dashboard.transactions.wizard();
    let results = wizard.results();
    let Some(mapping) = wizard.mapping() else { return };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let (mapped, required) = mapping.progress();
    let missing: Vec<&str> = mapping.missing().iter().map(|f| f.name()).collect();
    let status = if missing.is_empty() {
        Span::styled("ready to submit (s)", Style::default().fg(Color::Green))
    } else {
        Span::styled(format!("missing: {}", missing.join(", ")), Style::default().fg(Color::Red))
    };
    let info = Paragraph::new(Line::from(vec![
        Span::raw(format!(
            "{} · {} rows · {} parse issues · required columns {mapped} / {required} · ",
            results.meta.source,
            results.meta.row_count,
            results.errors.len()
        )),
        status,
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Import transactions "));
    f.render_widget(info, chunks[0]);

    let header_cells: Vec<Cell> = results
        .headers
        .iter()
        .enumerate()
        .map(|(column, header)| {
            let field = mapping.field_for(column).map_or("skip", |f| f.name());
            let mut style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
            if column == app.import_column {
                style = style.bg(Color::Blue);
            }
            Cell::from(format!("{header} → {field}")).style(style)
        })
        .collect();

    let rows: Vec<Row> = results
        .rows
        .iter()
        .take(200)
        .map(|cells| Row::new(cells.iter().map(|c| Cell::from(truncate(c, 24))).collect::<Vec<_>>()))
        .collect();

    let width = results.column_count().max(1) as u32;
    let widths: Vec<Constraint> = (0..width).map(|_| Constraint::Ratio(1, width)).collect();
    let table = Table::new(rows, widths)
        .header(Row::new(header_cells).height(1))
        .block(Block::default().borders(Borders::ALL).title(" Preview "));
    f.render_widget(table, chunks[1]);
}

fn render_overview(f: &mut Frame, area: Rect, state: &QueryState<Summary>) {
    let Some(summary) = state.ready() else {
        let text = match state {
            QueryState::Failed(err) => format!("Failed to load summary: {err}"),
            _ => "Loading summary…".to_string(),
        };
        f.render_widget(Paragraph::new(text).block(Block::default().borders(Borders::ALL)), area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(6), Constraint::Length(8)])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(1, 3), Constraint::Ratio(1, 3)])
        .split(chunks[0]);

    let figures = [
        ("Remaining", summary.remaining_amount, summary.remaining_change),
        ("Income", summary.income_amount, summary.income_change),
        ("Expenses", summary.expenses_amount, summary.expenses_change),
    ];
    for (card, (title, amount, change)) in cards.iter().zip(figures) {
        let text = vec![
            Line::from(Span::styled(
                format_amount(amount),
                amount_style(amount).add_modifier(Modifier::BOLD),
            )),
            Line::from(format!("{change:+.1}% from last period")),
        ];
        let widget = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(format!(" {title} ")));
        f.render_widget(widget, *card);
    }

    let expenses: Vec<u64> = summary.days.iter().map(|d| d.expenses.unsigned_abs()).collect();
    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(" Daily expenses "))
        .data(&expenses)
        .style(Style::default().fg(Color::Red));
    f.render_widget(sparkline, chunks[1]);

    let items: Vec<ListItem> = summary
        .categories
        .iter()
        .map(|c| ListItem::new(format!("{:<24} {}", c.name, format_amount(c.value))))
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(" Top categories "));
    f.render_widget(list, chunks[2]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let hints = match app.current_page {
        Page::Transactions if app.dashboard.transactions.view() == WizardView::Import => {
            "←/→ column · Space map · s submit · c cancel"
        }
        Page::Transactions => {
            "j/k move · Space select · d delete · D delete selected · n new · e edit · u import · F all accounts"
        }
        Page::Accounts => "j/k move · Space select · d delete · D delete selected · n new · e rename · f transactions",
        Page::Categories => "j/k move · Space select · d delete · D delete selected · n new · e rename · r refresh",
        Page::Overview => "Tab switch page · r refresh · q quit",
    };

    let toast = app.notifier.last().map(|n| {
        let color = match n.level {
            NotificationLevel::Success => Color::Green,
            NotificationLevel::Error => Color::Red,
        };
        Span::styled(format!("{}  ", n.message), Style::default().fg(color))
    });

    let mut spans = Vec::new();
    spans.extend(toast);
    spans.push(Span::styled(hints, Style::default().fg(Color::DarkGray)));

    let bar = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(bar, area);
}

fn render_confirm(f: &mut Frame, prompt: &DialogPrompt) {
    let area = centered_rect(50, 7, f.size());
    let text = vec![
        Line::from(prompt.description.clone()),
        Line::from(""),
        Line::from(Span::styled("y confirm · n cancel", Style::default().fg(Color::DarkGray))),
    ];
    let dialog = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" {} ", prompt.title)),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn render_select(f: &mut Frame, prompt: &DialogPrompt, highlighted: usize) {
    let height = prompt.options.len() as u16 + 4;
    let area = centered_rect(50, height.min(20), f.size());

    let mut lines = vec![Line::from(prompt.description.clone())];
    if prompt.options.is_empty() {
        lines.push(Line::from(Span::styled(
            "No accounts yet, Esc to go back",
            Style::default().fg(Color::Red),
        )));
    }
    for (i, option) in prompt.options.iter().enumerate() {
        let style = if i == highlighted {
            Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!("  {}", option.label), style)));
    }

    let dialog = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" {} ", prompt.title)),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn render_input(f: &mut Frame, input: &Input) {
    let area = centered_rect(60, 3, f.size());
    let widget = Paragraph::new(format!("{}▏", input.buffer)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" {} ", input.kind.title())),
    );
    f.render_widget(Clear, area);
    f.render_widget(widget, area);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height: height.min(area.height),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
