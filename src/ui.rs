use anyhow::Result;
use chrono::{FixedOffset, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rate_board::display::{format_clock, format_last_updated};
use rate_board::{
    build_view, BoardController, ChangeFlags, ConfirmState, OverrideTarget, Renderer,
    ResolvedRates, Severity,
};
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

// ============================================================================
// RENDERER
// ============================================================================

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub severity: Severity,
    pub shown_at: Instant,
}

/// Terminal side of the board. Owns the highlight and toast timers.
pub struct TuiRenderer {
    rates: ResolvedRates,
    highlights: HashMap<OverrideTarget, Instant>,
    highlight_for: Duration,
    toasts: Vec<Toast>,
    toast_for: Duration,
    locked: bool,
}

const MAX_TOASTS: usize = 3;

impl TuiRenderer {
    pub fn new(highlight_for: Duration, toast_for: Duration) -> Self {
        Self {
            rates: ResolvedRates::default(),
            highlights: HashMap::new(),
            highlight_for,
            toasts: Vec::new(),
            toast_for,
            locked: false,
        }
    }

    /// Drop highlights and toasts whose time is up
    pub fn expire(&mut self, now: Instant) {
        let highlight_for = self.highlight_for;
        self.highlights
            .retain(|_, since| now.duration_since(*since) < highlight_for);
        let toast_for = self.toast_for;
        self.toasts
            .retain(|t| now.duration_since(t.shown_at) < toast_for);
    }

    pub fn is_highlighted(&self, target: &OverrideTarget) -> bool {
        self.highlights.contains_key(target)
    }

    pub fn rates(&self) -> &ResolvedRates {
        &self.rates
    }
}

impl Renderer for TuiRenderer {
    fn on_rates_resolved(&mut self, rates: &ResolvedRates, changes: &ChangeFlags) {
        self.rates = rates.clone();
        let now = Instant::now();
        for target in changes.iter() {
            self.highlights.insert(target.clone(), now);
        }
    }

    fn on_lock_state_changed(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn on_notify(&mut self, message: &str, severity: Severity) {
        self.toasts.push(Toast {
            message: message.to_string(),
            severity,
            shown_at: Instant::now(),
        });
        if self.toasts.len() > MAX_TOASTS {
            self.toasts.remove(0);
        }
    }
}

// ============================================================================
// APP STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    ToggleLock,
    OpenPanel,
}

impl PromptPurpose {
    fn title(&self) -> &str {
        match self {
            PromptPurpose::ToggleLock => " Enter password to toggle lock ",
            PromptPurpose::OpenPanel => " Enter password to access manual settings ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelTab {
    Forex,
    Interest,
}

impl PanelTab {
    pub fn next(&self) -> Self {
        match self {
            PanelTab::Forex => PanelTab::Interest,
            PanelTab::Interest => PanelTab::Forex,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PanelTab::Forex => "Forex",
            PanelTab::Interest => "Interest",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Board,
    Prompt(PromptPurpose),
    Panel,
    Editing(OverrideTarget),
}

pub struct App {
    pub controller: BoardController<TuiRenderer>,
    pub mode: Mode,
    pub tab: PanelTab,
    pub panel_state: TableState,
    pub input: String,
    pub offset: FixedOffset,
}

impl App {
    pub fn new(controller: BoardController<TuiRenderer>, offset: FixedOffset) -> Self {
        let mut panel_state = TableState::default();
        panel_state.select(Some(0));

        Self {
            controller,
            mode: Mode::Board,
            tab: PanelTab::Forex,
            panel_state,
            input: String::new(),
            offset,
        }
    }

    fn panel_len(&self) -> usize {
        match self.tab {
            PanelTab::Forex => self.controller.reference().currencies().len(),
            PanelTab::Interest => self.controller.reference().terms().len(),
        }
    }

    pub fn next(&mut self) {
        let len = self.panel_len();
        if len == 0 {
            return;
        }
        let i = match self.panel_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.panel_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.panel_len();
        if len == 0 {
            return;
        }
        let i = match self.panel_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.panel_state.select(Some(i));
    }

    pub fn switch_tab(&mut self) {
        self.tab = self.tab.next();
        self.panel_state.select(Some(0));
    }

    /// Cell under the cursor for the given side (ignored on the interest tab)
    fn selected_target(&self, buy_side: bool) -> Option<OverrideTarget> {
        let i = self.panel_state.selected()?;
        let reference = self.controller.reference();
        match self.tab {
            PanelTab::Forex => reference.currencies().get(i).map(|c| {
                if buy_side {
                    OverrideTarget::buy(&c.code)
                } else {
                    OverrideTarget::sell(&c.code)
                }
            }),
            PanelTab::Interest => reference
                .terms()
                .get(i)
                .map(|t| OverrideTarget::interest(&t.label)),
        }
    }

    fn start_editing(&mut self, target: OverrideTarget) {
        // Pre-fill with the current override so Enter keeps it
        self.input = self
            .controller
            .overrides()
            .get(&target)
            .map(|v| v.to_string())
            .unwrap_or_default();
        self.mode = Mode::Editing(target);
    }

    fn open_prompt(&mut self, purpose: PromptPurpose) {
        self.input.clear();
        self.mode = Mode::Prompt(purpose);
    }

    fn submit_prompt(&mut self, purpose: PromptPurpose) {
        let password = std::mem::take(&mut self.input);
        self.mode = match purpose {
            PromptPurpose::ToggleLock => {
                let _ = self.controller.attempt_unlock_toggle(&password);
                Mode::Board
            }
            PromptPurpose::OpenPanel => match self.controller.attempt_edit_access(&password) {
                Ok(()) => {
                    self.tab = PanelTab::Forex;
                    self.panel_state.select(Some(0));
                    Mode::Panel
                }
                Err(_) => Mode::Board,
            },
        };
    }

    fn request_panel(&mut self) {
        if self.controller.is_locked() {
            // Refused without asking for a password
            let _ = self.controller.attempt_edit_access("");
        } else {
            self.open_prompt(PromptPurpose::OpenPanel);
        }
    }

    fn close_panel(&mut self) {
        self.controller.cancel_reset();
        self.controller.close_edit_panel();
        self.mode = Mode::Board;
    }

    /// Returns false when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        // Confirmation dialog sits above everything else in the panel
        if self.controller.confirm_state() != ConfirmState::Idle {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    let _ = self.controller.confirm_reset();
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.controller.cancel_reset();
                }
                _ => {}
            }
            return true;
        }

        match self.mode.clone() {
            // Modifiers are ignored here, so Ctrl+M lands on 'm' when the
            // terminal reports it as a key and not as Enter
            Mode::Board => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return false,
                KeyCode::Char('l') => self.open_prompt(PromptPurpose::ToggleLock),
                KeyCode::Char('m') => self.request_panel(),
                _ => {}
            },
            Mode::Prompt(purpose) => match key.code {
                KeyCode::Enter => self.submit_prompt(purpose),
                KeyCode::Esc => {
                    self.input.clear();
                    self.mode = Mode::Board;
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            },
            Mode::Panel => match key.code {
                KeyCode::Esc => self.close_panel(),
                KeyCode::Tab | KeyCode::BackTab => self.switch_tab(),
                KeyCode::Down | KeyCode::Char('j') => self.next(),
                KeyCode::Up | KeyCode::Char('k') => self.previous(),
                KeyCode::Char('b') if self.tab == PanelTab::Forex => {
                    if let Some(target) = self.selected_target(true) {
                        self.start_editing(target);
                    }
                }
                KeyCode::Char('s') if self.tab == PanelTab::Forex => {
                    if let Some(target) = self.selected_target(false) {
                        self.start_editing(target);
                    }
                }
                KeyCode::Enter if self.tab == PanelTab::Interest => {
                    if let Some(target) = self.selected_target(false) {
                        self.start_editing(target);
                    }
                }
                KeyCode::Char('R') => {
                    let _ = self.controller.request_reset();
                }
                _ => {}
            },
            Mode::Editing(target) => match key.code {
                KeyCode::Enter => {
                    let raw = std::mem::take(&mut self.input);
                    let _ = self.controller.submit_override(target, &raw);
                    self.mode = Mode::Panel;
                }
                KeyCode::Esc => {
                    self.input.clear();
                    self.mode = Mode::Panel;
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' || c == '-' => {
                    self.input.push(c)
                }
                _ => {}
            },
        }
        true
    }
}

// ============================================================================
// EVENT LOOP
// ============================================================================

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

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    // Tick often enough for the clock and highlight expiry
    let tick = Duration::from_millis(250);

    loop {
        app.controller.renderer_mut().expire(Instant::now());
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(tick)? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// DRAWING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Header with clock
            Constraint::Min(0),    // Rate tables
            Constraint::Length(3), // Toasts / key hints
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    render_forex(f, body[0], app);
    render_interest(f, body[1], app);
    render_status_bar(f, chunks[2], app);

    match app.mode.clone() {
        Mode::Board => {}
        Mode::Prompt(purpose) => render_prompt(f, purpose.title(), &masked(&app.input)),
        Mode::Panel => render_panel(f, app),
        Mode::Editing(target) => {
            render_panel(f, app);
            let title = format!(" Manual rate for {} (empty clears) ", target);
            render_prompt(f, &title, &app.input);
        }
    }

    if let ConfirmState::Pending(intent) = app.controller.confirm_state() {
        render_confirm(f, intent.prompt());
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let (date, time) = format_clock(Utc::now(), app.offset);
    let locked = app.controller.is_locked();
    let updated = format_last_updated(app.controller.snapshot().resolved_at, app.offset);

    let mut top = vec![Span::styled(
        "FOREIGN EXCHANGE & INTEREST RATES",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];
    if locked {
        top.push(Span::raw("  "));
        top.push(Span::styled(
            "LOCKED",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let bottom = vec![
        Span::styled(date, Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(time, Style::default().fg(Color::Yellow)),
        Span::raw("  │  "),
        Span::styled(
            "● OFFLINE MODE",
            Style::default()
                .fg(Color::Rgb(217, 119, 6))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  │  "),
        Span::styled(updated, Style::default().fg(Color::DarkGray)),
    ];

    let header = Paragraph::new(vec![Line::from(top), Line::from(bottom)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn rate_style(manual: bool, highlighted: bool) -> Style {
    let style = if manual {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    if highlighted {
        style.bg(Color::Green).fg(Color::Black)
    } else {
        style
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_forex(f: &mut Frame, area: Rect, app: &App) {
    let renderer = app.controller.renderer();
    let view = build_view(
        app.controller.reference(),
        renderer.rates(),
        app.controller.overrides(),
        &ChangeFlags::default(),
    );

    let rows = view.forex.iter().map(|row| {
        let buy_hl = renderer.is_highlighted(&OverrideTarget::buy(&row.code));
        let sell_hl = renderer.is_highlighted(&OverrideTarget::sell(&row.code));
        Row::new(vec![
            Cell::from(truncate(&row.label, 30)),
            Cell::from(row.buying.clone()).style(rate_style(row.buy_manual, buy_hl)),
            Cell::from(row.selling.clone()).style(rate_style(row.sell_manual, sell_hl)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(header_row(&["Currency", "Buying", "Selling"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Foreign Exchange "),
    );

    f.render_widget(table, area);
}

fn render_interest(f: &mut Frame, area: Rect, app: &App) {
    let renderer = app.controller.renderer();
    let view = build_view(
        app.controller.reference(),
        renderer.rates(),
        app.controller.overrides(),
        &ChangeFlags::default(),
    );

    let rows = view.interest.iter().map(|row| {
        let highlighted = renderer.is_highlighted(&OverrideTarget::interest(&row.label));
        let label_style = if row.is_policy {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Row::new(vec![
            Cell::from(row.label.clone()).style(label_style),
            Cell::from(row.rate.clone()).style(rate_style(row.manual, highlighted)),
        ])
        .height(if row.is_policy { 2 } else { 1 })
    });

    let table = Table::new(rows, [Constraint::Length(20), Constraint::Length(10)])
        .header(header_row(&["Term", "Rate"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Interest Rates "),
        );

    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let renderer = app.controller.renderer();

    let spans = match renderer.toasts.last() {
        Some(toast) => {
            let color = match toast.severity {
                Severity::Success => Color::Green,
                Severity::Warning => Color::Yellow,
                Severity::Error => Color::Red,
            };
            vec![Span::styled(
                format!(" {} ", toast.message),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )]
        }
        None => key_hints(&app.mode),
    };

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn key_hints(mode: &Mode) -> Vec<Span<'static>> {
    let keys: &[(&'static str, &'static str)] = match mode {
        Mode::Board => &[("m", " Manual | "), ("l", " Lock | "), ("q", " Quit")],
        Mode::Panel => &[
            ("Tab", " Forex/Interest | "),
            ("↑/↓", " Nav | "),
            ("b/s", " Edit buy/sell | "),
            ("Enter", " Edit rate | "),
            ("R", " Reset all | "),
            ("Esc", " Close"),
        ],
        Mode::Prompt(_) | Mode::Editing(_) => &[("Enter", " Submit | "), ("Esc", " Cancel")],
    };

    let mut spans = vec![Span::raw(" ")];
    for (key, label) in keys {
        spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(*label));
    }
    spans
}

fn render_panel(f: &mut Frame, app: &mut App) {
    let area = centered_rect(80, 70, f.size());
    f.render_widget(Clear, area);

    let controller = &app.controller;
    let reference = controller.reference();
    let overrides = controller.overrides();
    let rates = controller.renderer().rates();
    let view = build_view(reference, rates, overrides, &ChangeFlags::default());

    let title = format!(
        " Manual Rates - [{}] {} ",
        app.tab.title(),
        match app.tab {
            PanelTab::Forex => "b: buy  s: sell",
            PanelTab::Interest => "Enter: edit",
        }
    );

    let table = match app.tab {
        PanelTab::Forex => {
            let rows: Vec<Row> = reference
                .currencies()
                .iter()
                .zip(view.forex.iter())
                .map(|(c, row)| {
                    Row::new(vec![
                        Cell::from(c.code.clone()),
                        Cell::from(truncate(&c.name, 20)),
                        Cell::from(override_text(overrides.get(&OverrideTarget::buy(&c.code)))),
                        Cell::from(override_text(overrides.get(&OverrideTarget::sell(&c.code)))),
                        Cell::from(format!("{} / {}", row.buying, row.selling))
                            .style(Style::default().fg(Color::DarkGray)),
                    ])
                })
                .collect();
            Table::new(
                rows,
                [
                    Constraint::Length(6),
                    Constraint::Length(22),
                    Constraint::Length(12),
                    Constraint::Length(12),
                    Constraint::Min(10),
                ],
            )
            .header(header_row(&["Code", "Name", "Buying", "Selling", "Live"]))
        }
        PanelTab::Interest => {
            let rows: Vec<Row> = reference
                .terms()
                .iter()
                .map(|t| {
                    Row::new(vec![
                        Cell::from(t.label.clone()),
                        Cell::from(override_text(overrides.get(&OverrideTarget::interest(&t.label)))),
                        Cell::from(format!("Default: {:.2}%", t.rate))
                            .style(Style::default().fg(Color::DarkGray)),
                    ])
                })
                .collect();
            Table::new(
                rows,
                [
                    Constraint::Length(20),
                    Constraint::Length(12),
                    Constraint::Min(10),
                ],
            )
            .header(header_row(&["Term", "Override", "Default"]))
        }
    }
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.panel_state);
}

fn masked(input: &str) -> String {
    "*".repeat(input.chars().count())
}

fn override_text(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn render_prompt(f: &mut Frame, title: &str, text: &str) {
    let area = centered_rect(50, 15, f.size());
    f.render_widget(Clear, area);

    let prompt = Paragraph::new(vec![Line::from(""), Line::from(format!("  {}", text))]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title.to_string()),
    );
    f.render_widget(prompt, area);
}

fn render_confirm(f: &mut Frame, message: &str) {
    let area = centered_rect(50, 20, f.size());
    f.render_widget(Clear, area);

    let content = vec![
        Line::from(""),
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" Confirm   "),
            Span::styled("n", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw(" Cancel"),
        ]),
    ];

    let dialog = Paragraph::new(content).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Confirm "),
    );
    f.render_widget(dialog, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}
