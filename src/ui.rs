use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use member_registry::{IdentityNumber, Member, MemberQuery, MemberStatus};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

const PAGE_SIZE: usize = 20;

/// Which text field keystrokes go to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Cellphone,
}

/// Current list filters, mirroring the admin list screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub search: String,
    pub cellphone: String,
    pub status: Option<MemberStatus>,
}

impl FilterState {
    pub fn query(&self) -> MemberQuery {
        MemberQuery::new()
            .search(Some(&self.search))
            .cellphone(Some(&self.cellphone))
            .status(self.status)
    }

    pub fn is_active(&self) -> bool {
        !self.query().is_empty()
    }

    /// None → Active → Inactive → Suspended → None
    pub fn cycle_status(&mut self) {
        self.status = match self.status {
            None => Some(MemberStatus::Active),
            Some(MemberStatus::Active) => Some(MemberStatus::Inactive),
            Some(MemberStatus::Inactive) => Some(MemberStatus::Suspended),
            Some(MemberStatus::Suspended) => None,
        };
    }
}

pub struct App {
    pub members: Vec<Member>,
    pub filtered_members: Vec<Member>,
    pub state: TableState,
    pub total_count: i64,
    pub show_detail: bool,
    pub input_mode: InputMode,
    pub filter_state: FilterState,
    pub today: chrono::NaiveDate,
}

impl App {
    pub fn new(members: Vec<Member>, total_count: i64, today: chrono::NaiveDate) -> Self {
        let mut state = TableState::default();
        if !members.is_empty() {
            state.select(Some(0));
        }

        let filtered_members = members.clone();

        Self {
            members,
            filtered_members,
            state,
            total_count,
            show_detail: false,
            input_mode: InputMode::Normal,
            filter_state: FilterState::default(),
            today,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_member(&self) -> Option<&Member> {
        self.state.selected().and_then(|i| self.filtered_members.get(i))
    }

    pub fn apply_filter(&mut self) {
        let query = self.filter_state.query();
        self.filtered_members = self
            .members
            .iter()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();

        // Reset selection to first item
        if !self.filtered_members.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn clear_filter(&mut self) {
        self.filter_state = FilterState::default();
        self.apply_filter();
    }

    pub fn cycle_status(&mut self) {
        self.filter_state.cycle_status();
        self.apply_filter();
    }

    pub fn push_char(&mut self, c: char) {
        match self.input_mode {
            InputMode::Search => self.filter_state.search.push(c),
            InputMode::Cellphone => self.filter_state.cellphone.push(c),
            InputMode::Normal => return,
        }
        self.apply_filter();
    }

    pub fn pop_char(&mut self) {
        match self.input_mode {
            InputMode::Search => self.filter_state.search.pop(),
            InputMode::Cellphone => self.filter_state.cellphone.pop(),
            InputMode::Normal => return,
        };
        self.apply_filter();
    }

    pub fn next(&mut self) {
        let len = self.filtered_members.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.filtered_members.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.filtered_members.len();
        if len == 0 {
            return;
        }
        let i = self
            .state
            .selected()
            .map(|i| (i + PAGE_SIZE).min(len - 1))
            .unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self
            .state
            .selected()
            .map(|i| i.saturating_sub(PAGE_SIZE))
            .unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn status_counts(&self) -> [(MemberStatus, usize); 3] {
        MemberStatus::ALL.map(|status| {
            let count = self.members.iter().filter(|m| m.status == status).count();
            (status, count)
        })
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal UI failed");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };

        if app.input_mode != InputMode::Normal {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => app.input_mode = InputMode::Normal,
                KeyCode::Backspace => app.pop_char(),
                KeyCode::Char(c) => app.push_char(c),
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Enter => app.toggle_detail(),
            KeyCode::Char('/') => app.input_mode = InputMode::Search,
            KeyCode::Char('f') => app.input_mode = InputMode::Cellphone,
            KeyCode::Char('s') => app.cycle_status(),
            KeyCode::Char('c') => app.clear_filter(),
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            KeyCode::PageDown => app.page_down(),
            KeyCode::PageUp => app.page_up(),
            KeyCode::Home => app.state.select(Some(0)),
            KeyCode::End => {
                if !app.filtered_members.is_empty() {
                    app.state.select(Some(app.filtered_members.len() - 1));
                }
            }
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Filters
            Constraint::Min(0),    // Member list
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_filters(f, chunks[1], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[2]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[2], app);
    }

    render_status_bar(f, chunks[3], app);
}

fn status_color(status: MemberStatus) -> Color {
    match status {
        MemberStatus::Active => Color::Green,
        MemberStatus::Inactive => Color::Yellow,
        MemberStatus::Suspended => Color::Red,
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled(
            "Members",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Total: {}", app.total_count),
            Style::default().fg(Color::White),
        ),
    ];

    for (status, count) in app.status_counts() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} {}", status.label(), count),
            Style::default().fg(status_color(status)),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_filters(f: &mut Frame, area: Rect, app: &App) {
    let field = |label: &'static str, value: &str, mode: InputMode| {
        let style = if app.input_mode == mode {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        vec![
            Span::styled(label, style),
            Span::raw(format!("[{}] ", value)),
        ]
    };

    let mut spans = field(" ID / member #: ", &app.filter_state.search, InputMode::Search);
    spans.extend(field(" Cellphone: ", &app.filter_state.cellphone, InputMode::Cellphone));
    spans.push(Span::styled(" Status: ", Style::default().fg(Color::DarkGray)));
    spans.push(match app.filter_state.status {
        Some(status) => Span::styled(status.label(), Style::default().fg(status_color(status))),
        None => Span::raw("All"),
    });

    let filters = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Filters "),
    );

    f.render_widget(filters, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Member #", "Name", "ID Number", "Email", "Cellphone", "Status"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.filtered_members.iter().map(|member| {
        let cells = vec![
            Cell::from(member.member_number.clone()),
            Cell::from(truncate(&member.full_name(), 28)),
            Cell::from(member.id_number.clone()),
            Cell::from(truncate(&member.email, 32)),
            Cell::from(member.cellphone.clone()),
            Cell::from(member.status.label())
                .style(Style::default().fg(status_color(member.status))),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(30),
            Constraint::Length(15),
            Constraint::Length(34),
            Constraint::Length(14),
            Constraint::Length(11),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Members "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.filtered_members.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if app.filter_state.is_active() {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("Filtered", Style::default().fg(Color::Green)));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    let keys: &[(&str, &str)] = match app.input_mode {
        InputMode::Normal => &[
            ("/", " Search"),
            ("f", " Cellphone"),
            ("s", " Status"),
            ("Enter", " Details"),
            ("↑/↓", " Nav"),
        ],
        InputMode::Search | InputMode::Cellphone => &[("Enter/Esc", " Done"), ("Backspace", " Delete")],
    };

    for (key, action) in keys {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(*action));
    }

    if app.input_mode == InputMode::Normal {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
        status_spans.push(Span::raw(" Quit"));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}

fn detail_line<'a>(label: &'a str, value: impl Into<Span<'a>>) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            format!("  {}: ", label),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        value.into(),
    ])
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Member Details ");

    let Some(member) = app.selected_member() else {
        f.render_widget(Paragraph::new("No member selected").block(block), area);
        return;
    };

    let identity = IdentityNumber::parse(&member.id_number, app.today).ok();
    let gender = identity.as_ref().map(|id| id.gender().as_str()).unwrap_or("-");
    let citizenship = identity
        .as_ref()
        .map(|id| id.citizenship().as_str())
        .unwrap_or("-");

    let content = vec![
        Line::from(""),
        detail_line("Member #", Span::raw(member.member_number.as_str())),
        detail_line("Name", Span::raw(member.full_name())),
        Line::from(""),
        detail_line("ID Number", Span::raw(member.id_number.as_str())),
        detail_line(
            "Date of Birth",
            Span::raw(member.date_of_birth.format("%d %B %Y").to_string()),
        ),
        detail_line("Gender", Span::raw(gender)),
        detail_line("Citizenship", Span::raw(citizenship)),
        Line::from(""),
        detail_line("Email", Span::raw(member.email.as_str())),
        detail_line("Cellphone", Span::raw(member.cellphone.as_str())),
        detail_line(
            "Status",
            Span::styled(
                member.status.label(),
                Style::default().fg(status_color(member.status)),
            ),
        ),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        detail_line(
            "Created",
            Span::styled(
                member.created_at.format("%Y-%m-%d %H:%M").to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ),
        detail_line(
            "Updated",
            Span::styled(
                member.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  Press Enter to close",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )]),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}
