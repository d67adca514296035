use crate::dashboard::{page_sizes, Dashboard, Notice, NoticeLevel, ViewMode};
use chrono::{DateTime, Utc};
use database::Database;
use iced::widget::{
    button, column, container, pick_list, progress_bar, row, scrollable, text, text_input, Column,
    Row, Space,
};
use iced::{theme, Alignment, Color, Command, Element, Font, Length, Subscription};
use monitor_core::{
    AppConfig, ClientIdentity, ContentFilter, ContentItem, ContentPage, CoreError,
    DatabaseSettings, ErrorExt, Keyword, Preference, StoredItem, ALL_SUBREDDITS,
};
use std::time::Duration;
use tracing::{debug, info};

const SIDEBAR_WIDTH: f32 = 300.0;
const PREVIEW_CHARS: usize = 400;
const CELL_CHARS: usize = 48;

#[derive(Debug, Clone)]
pub struct DashboardFlags {
    pub config: AppConfig,
    pub identity: ClientIdentity,
}

/// Everything the sidebar needs after a store round trip.
#[derive(Debug, Clone)]
pub struct Overview {
    keywords: Result<Vec<Keyword>, Notice>,
    preference: Result<Preference, Notice>,
    subreddits: Result<Vec<String>, Notice>,
    initial: bool,
}

#[derive(Debug, Clone)]
pub enum Message {
    Connected(Result<Database, Notice>),
    Reconnect,
    Tick,
    Refresh,
    OverviewLoaded(Overview),
    /// Query tag and outcome; only the latest tag is applied.
    PageLoaded(u64, Result<(ContentFilter, ContentPage<StoredItem>), Notice>),
    StartDateChanged(String),
    EndDateChanged(String),
    ApplyFilters,
    KeywordFilterToggled(String),
    SubredditToggled(String),
    PageSizeSelected(u32),
    NextPage,
    PreviousPage,
    ViewModeSelected(ViewMode),
    NewKeywordChanged(String),
    AddKeyword,
    KeywordAdded(Result<(String, Vec<Keyword>), Notice>),
    SetKeywordActive(String, bool),
    DeleteKeyword(String),
    KeywordsUpdated(Result<Vec<Keyword>, Notice>),
    SavePreferences,
    PreferencesSaved(Result<(), Notice>),
    CopyLink(String),
    DismissNotice,
}

enum Connection {
    Connecting,
    Ready(Database),
    Failed(String),
}

pub struct App {
    settings: DatabaseSettings,
    refresh_every: Duration,
    connection: Connection,
    dashboard: Dashboard,
    loading: bool,
    last_refresh: Option<DateTime<Utc>>,
}

impl App {
    pub fn new(flags: DashboardFlags) -> (Self, Command<Message>) {
        let DashboardFlags { config, identity } = flags;
        info!("Opening dashboard for client {}", identity.user_id);

        let dashboard = Dashboard::new(
            identity.user_id,
            config.dashboard.default_page_size,
            config.dashboard.lookback_days,
            Utc::now().date_naive(),
        );
        let app = Self {
            settings: config.database.clone(),
            refresh_every: Duration::from_secs(config.dashboard.auto_refresh_secs.max(1)),
            connection: Connection::Connecting,
            dashboard,
            loading: false,
            last_refresh: None,
        };
        let command = connect(app.settings.clone());
        (app, command)
    }

    pub fn title(&self) -> String {
        "Reddit Monitor".to_string()
    }

    pub fn subscription(&self) -> Subscription<Message> {
        match self.connection {
            Connection::Ready(_) => iced::time::every(self.refresh_every).map(|_| Message::Tick),
            _ => Subscription::none(),
        }
    }

    fn database(&self) -> Option<Database> {
        match &self.connection {
            Connection::Ready(db) => Some(db.clone()),
            _ => None,
        }
    }

    /// Issues the query for the current inputs. Invalid dates leave the
    /// shown results alone.
    fn query(&mut self, report_invalid: bool) -> Command<Message> {
        let Some(db) = self.database() else {
            return Command::none();
        };

        match self.dashboard.build_filter() {
            Ok(filter) => {
                let page_size = self.dashboard.page_size;
                let page = self.dashboard.page;
                let seq = self.dashboard.begin_query();
                self.loading = true;
                debug!("Query {}: page {} with {:?}", seq, page, filter);
                Command::perform(
                    async move {
                        db.query_page(&filter, page_size, page)
                            .await
                            .map(|result| (filter, result))
                            .map_err(notice_for)
                    },
                    move |result| Message::PageLoaded(seq, result),
                )
            }
            Err(e) => {
                if report_invalid {
                    self.dashboard.notice = Some(Notice::warning(e.user_friendly_message()));
                }
                Command::none()
            }
        }
    }

    fn overview(&self, initial: bool) -> Command<Message> {
        match self.database() {
            Some(db) => load_overview(db, self.dashboard.user_id.clone(), initial),
            None => Command::none(),
        }
    }

    pub fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::Connected(Ok(db)) => {
                self.connection = Connection::Ready(db);
                self.overview(true)
            }
            Message::Connected(Err(notice)) => {
                self.connection = Connection::Failed(notice.message);
                Command::none()
            }
            Message::Reconnect => {
                self.connection = Connection::Connecting;
                connect(self.settings.clone())
            }
            Message::Tick => {
                if self.loading {
                    return Command::none();
                }
                let query = self.query(false);
                Command::batch([self.overview(false), query])
            }
            Message::Refresh => {
                let query = self.query(true);
                Command::batch([self.overview(false), query])
            }
            Message::OverviewLoaded(overview) => {
                let mut problems = Vec::new();
                match overview.keywords {
                    Ok(keywords) => self.dashboard.set_keywords(keywords),
                    Err(notice) => problems.push(notice.message),
                }
                if overview.initial {
                    match overview.preference {
                        Ok(preference) => self.dashboard.apply_preference(preference),
                        Err(notice) => problems.push(notice.message),
                    }
                }
                match overview.subreddits {
                    Ok(subreddits) => self.dashboard.set_subreddit_options(subreddits),
                    Err(notice) => problems.push(notice.message),
                }
                if !problems.is_empty() {
                    self.dashboard.notice = Some(Notice::error(problems.join(" ")));
                }

                if overview.initial {
                    self.query(true)
                } else {
                    Command::none()
                }
            }
            Message::PageLoaded(seq, _) if !self.dashboard.is_latest_query(seq) => {
                debug!("Dropping results of superseded query {}", seq);
                Command::none()
            }
            Message::PageLoaded(_, result) => {
                self.loading = false;
                match result {
                    Ok((filter, page)) => {
                        self.dashboard.apply_page(filter, page);
                        self.last_refresh = Some(Utc::now());
                    }
                    Err(notice) => {
                        self.dashboard.clear_page();
                        self.dashboard.notice = Some(notice);
                    }
                }
                Command::none()
            }
            Message::StartDateChanged(value) => {
                self.dashboard.start_input = value;
                Command::none()
            }
            Message::EndDateChanged(value) => {
                self.dashboard.end_input = value;
                Command::none()
            }
            Message::ApplyFilters => {
                self.dashboard.page = 1;
                if self.dashboard.build_filter().is_ok() {
                    self.clear_warning();
                }
                self.query(true)
            }
            Message::KeywordFilterToggled(keyword) => {
                self.dashboard.toggle_keyword(&keyword);
                self.query(true)
            }
            Message::SubredditToggled(subreddit) => {
                self.dashboard.toggle_subreddit(&subreddit);
                self.query(true)
            }
            Message::PageSizeSelected(size) => {
                self.dashboard.set_page_size(size);
                self.query(true)
            }
            Message::NextPage => {
                self.dashboard.next_page();
                self.query(true)
            }
            Message::PreviousPage => {
                self.dashboard.previous_page();
                self.query(true)
            }
            Message::ViewModeSelected(mode) => {
                self.dashboard.view_mode = mode;
                Command::none()
            }
            Message::NewKeywordChanged(value) => {
                self.dashboard.new_keyword = value;
                Command::none()
            }
            Message::AddKeyword => {
                let Some(db) = self.database() else {
                    return Command::none();
                };
                let text = self.dashboard.new_keyword.clone();
                let user_id = self.dashboard.user_id.clone();
                Command::perform(
                    async move {
                        let keyword = db.add_keyword(&text).await?;
                        db.add_preferred_keyword(&user_id, &keyword.text).await?;
                        let keywords = db.list_keywords().await?;
                        Ok::<_, CoreError>((keyword.text, keywords))
                    },
                    |result| Message::KeywordAdded(result.map_err(notice_for)),
                )
            }
            Message::KeywordAdded(Ok((keyword, keywords))) => {
                self.dashboard.set_keywords(keywords);
                self.dashboard.toggle_keyword(&keyword);
                self.dashboard.new_keyword.clear();
                self.dashboard.notice = Some(Notice::info(format!("Added keyword '{}'.", keyword)));
                self.query(true)
            }
            Message::SetKeywordActive(keyword, active) => {
                let Some(db) = self.database() else {
                    return Command::none();
                };
                Command::perform(
                    async move {
                        db.set_keyword_active(&keyword, active).await?;
                        db.list_keywords().await
                    },
                    |result| Message::KeywordsUpdated(result.map_err(notice_for)),
                )
            }
            Message::DeleteKeyword(keyword) => {
                let Some(db) = self.database() else {
                    return Command::none();
                };
                Command::perform(
                    async move {
                        db.delete_keyword(&keyword).await?;
                        db.list_keywords().await
                    },
                    |result| Message::KeywordsUpdated(result.map_err(notice_for)),
                )
            }
            Message::KeywordsUpdated(Ok(keywords)) => {
                self.dashboard.set_keywords(keywords);
                self.query(true)
            }
            Message::KeywordAdded(Err(notice))
            | Message::KeywordsUpdated(Err(notice))
            | Message::PreferencesSaved(Err(notice)) => {
                self.dashboard.notice = Some(notice);
                Command::none()
            }
            Message::SavePreferences => {
                let Some(db) = self.database() else {
                    return Command::none();
                };
                let preference = self.dashboard.preference();
                Command::perform(
                    async move { db.save_preferences(&preference).await.map_err(notice_for) },
                    Message::PreferencesSaved,
                )
            }
            Message::PreferencesSaved(Ok(())) => {
                self.dashboard.notice = Some(Notice::info("Preferences saved."));
                Command::none()
            }
            Message::CopyLink(link) => {
                self.dashboard.notice = Some(Notice::info(format!("Copied {}", link)));
                iced::clipboard::write(link)
            }
            Message::DismissNotice => {
                self.dashboard.notice = None;
                Command::none()
            }
        }
    }

    fn clear_warning(&mut self) {
        if matches!(&self.dashboard.notice, Some(n) if n.level == NoticeLevel::Warning) {
            self.dashboard.notice = None;
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let body: Element<'_, Message> = match &self.connection {
            Connection::Connecting => text("Connecting to the database...").size(16).into(),
            Connection::Failed(reason) => column![
                text("The content store is unavailable.").size(20).style(error_color()),
                text(reason).size(14),
                button("Retry").on_press(Message::Reconnect),
            ]
            .spacing(10)
            .into(),
            Connection::Ready(_) => row![
                container(scrollable(self.view_sidebar())).width(Length::Fixed(SIDEBAR_WIDTH)),
                self.view_main(),
            ]
            .spacing(20)
            .into(),
        };

        let mut header = row![text("Reddit Monitor").size(24), Space::with_width(Length::Fill)]
            .align_items(Alignment::Center)
            .spacing(10);
        if let Some(at) = self.last_refresh {
            header = header.push(text(format!("Updated {}", at.format("%H:%M:%S UTC"))).size(12));
        }
        if matches!(self.connection, Connection::Ready(_)) {
            header = header.push(button("Refresh").on_press(Message::Refresh));
        }

        let mut page = Column::new().spacing(15).push(header);
        if let Some(notice) = &self.dashboard.notice {
            page = page.push(view_notice(notice));
        }
        page = page.push(body);

        container(page)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(20)
            .into()
    }

    fn view_sidebar(&self) -> Element<'_, Message> {
        let dashboard = &self.dashboard;

        let add_keyword = row![
            text_input("New keyword", &dashboard.new_keyword)
                .on_input(Message::NewKeywordChanged)
                .on_submit(Message::AddKeyword),
            button("Add").on_press(Message::AddKeyword),
        ]
        .spacing(5);

        let keywords = dashboard.keywords.iter().fold(Column::new().spacing(5), |col, keyword| {
            let selected = dashboard.selected_keywords.contains(&keyword.text);
            col.push(view_keyword_row(keyword, selected))
        });

        let dates = column![
            text("From (YYYY-MM-DD)").size(12),
            text_input("YYYY-MM-DD", &dashboard.start_input)
                .on_input(Message::StartDateChanged)
                .on_submit(Message::ApplyFilters),
            text("To (YYYY-MM-DD)").size(12),
            text_input("YYYY-MM-DD", &dashboard.end_input)
                .on_input(Message::EndDateChanged)
                .on_submit(Message::ApplyFilters),
            button("Apply").on_press(Message::ApplyFilters),
        ]
        .spacing(5);

        let all_selected = dashboard.selected_subreddits.is_empty();
        let subreddits = dashboard.subreddit_options.iter().fold(
            Column::new().spacing(3).push(
                toggle_button(ALL_SUBREDDITS, all_selected)
                    .on_press(Message::SubredditToggled(ALL_SUBREDDITS.to_string())),
            ),
            |col, name| {
                let selected = dashboard.selected_subreddits.contains(name);
                col.push(
                    toggle_button(&format!("r/{}", name), selected)
                        .on_press(Message::SubredditToggled(name.clone())),
                )
            },
        );

        let page_size = row![
            text("Page size").size(14),
            pick_list(page_sizes(), Some(dashboard.page_size), Message::PageSizeSelected),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        column![
            text("Keywords").size(18),
            add_keyword,
            keywords,
            button("Save selection").on_press(Message::SavePreferences),
            text("Date range").size(18),
            dates,
            text("Subreddits").size(18),
            subreddits,
            page_size,
        ]
        .spacing(12)
        .padding(5)
        .into()
    }

    fn view_main(&self) -> Element<'_, Message> {
        let dashboard = &self.dashboard;

        let tabs = ViewMode::ALL.iter().fold(Row::new().spacing(5), |tabs, mode| {
            tabs.push(
                toggle_button(mode.label(), dashboard.view_mode == *mode)
                    .on_press(Message::ViewModeSelected(*mode)),
            )
        });

        let results: Element<'_, Message> = if dashboard.items().is_empty() {
            let message = if self.loading {
                "Loading..."
            } else {
                "No items match the current filters."
            };
            text(message).size(16).into()
        } else {
            match dashboard.view_mode {
                ViewMode::List => view_list(dashboard.items()),
                ViewMode::Table => view_table(dashboard.items()),
                ViewMode::Chart => view_chart(dashboard.subreddit_counts()),
            }
        };

        let pager = match &dashboard.current {
            Some(current) => {
                let window = current.window;
                let previous = button("Previous");
                let next = button("Next");
                let previous = if window.has_previous() {
                    previous.on_press(Message::PreviousPage)
                } else {
                    previous
                };
                let next = if window.has_next() {
                    next.on_press(Message::NextPage)
                } else {
                    next
                };
                row![
                    previous,
                    text(format!(
                        "Page {} of {} ({} items)",
                        window.page, window.total_pages, window.total_count
                    ))
                    .size(14),
                    next,
                ]
                .spacing(10)
                .align_items(Alignment::Center)
            }
            None => row![],
        };

        let query = column![
            text("Active query").size(14),
            text(dashboard.describe_query()).font(Font::MONOSPACE).size(12),
        ]
        .spacing(5);

        column![
            tabs,
            scrollable(results).height(Length::Fill),
            pager,
            query,
        ]
        .spacing(12)
        .width(Length::Fill)
        .into()
    }
}

fn connect(settings: DatabaseSettings) -> Command<Message> {
    Command::perform(
        async move { Database::open(&settings).await.map_err(notice_for) },
        Message::Connected,
    )
}

fn load_overview(db: Database, user_id: String, initial: bool) -> Command<Message> {
    Command::perform(
        async move {
            Overview {
                keywords: db.list_keywords().await.map_err(notice_for),
                preference: db.load_preferences(&user_id).await.map_err(notice_for),
                subreddits: db.distinct_subreddits().await.map_err(notice_for),
                initial,
            }
        },
        Message::OverviewLoaded,
    )
}

/// Bad input is a warning, anything else is an error.
fn notice_for(error: CoreError) -> Notice {
    if error.is_user_error() {
        error.log_warn();
        Notice::warning(error.user_friendly_message())
    } else {
        error.log_error();
        Notice::error(error.user_friendly_message())
    }
}

fn error_color() -> Color {
    Color::from_rgb(0.8, 0.2, 0.2)
}

fn view_notice(notice: &Notice) -> Element<'_, Message> {
    let color = match notice.level {
        NoticeLevel::Info => Color::from_rgb(0.2, 0.5, 0.2),
        NoticeLevel::Warning => Color::from_rgb(0.8, 0.55, 0.0),
        NoticeLevel::Error => error_color(),
    };
    row![
        text(&notice.message).size(14).style(color),
        Space::with_width(Length::Fill),
        button("Dismiss")
            .style(theme::Button::Text)
            .on_press(Message::DismissNotice),
    ]
    .align_items(Alignment::Center)
    .into()
}

fn toggle_button<'a>(label: &str, selected: bool) -> iced::widget::Button<'a, Message> {
    button(text(label).size(14)).style(if selected {
        theme::Button::Primary
    } else {
        theme::Button::Secondary
    })
}

fn view_keyword_row(keyword: &Keyword, selected: bool) -> Element<'_, Message> {
    let label = if keyword.active {
        toggle_button(&keyword.text, selected)
            .on_press(Message::KeywordFilterToggled(keyword.text.clone()))
    } else {
        toggle_button(&format!("{} (inactive)", keyword.text), false)
    };

    let toggle_active = button(text(if keyword.active { "Deactivate" } else { "Activate" }).size(12))
        .style(theme::Button::Secondary)
        .on_press(Message::SetKeywordActive(keyword.text.clone(), !keyword.active));
    let delete = button(text("Delete").size(12))
        .style(theme::Button::Destructive)
        .on_press(Message::DeleteKeyword(keyword.text.clone()));

    row![label, Space::with_width(Length::Fill), toggle_active, delete]
        .spacing(5)
        .align_items(Alignment::Center)
        .into()
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut shortened: String = value.chars().take(max_chars).collect();
        shortened.push_str("...");
        shortened
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn view_list(items: &[StoredItem]) -> Element<'_, Message> {
    items
        .iter()
        .fold(Column::new().spacing(12), |col, item| col.push(view_list_item(item)))
        .into()
}

fn view_list_item(item: &StoredItem) -> Element<'_, Message> {
    let content: Column<'_, Message> = match item {
        StoredItem::Known(ContentItem::Submission(s)) => {
            let mut col = column![
                button(text(&s.title).size(16))
                    .style(theme::Button::Text)
                    .on_press(Message::CopyLink(s.url.clone())),
                text(format!(
                    "{} points | u/{} | {} | r/{}",
                    s.score,
                    s.author,
                    format_time(s.created_at),
                    s.subreddit
                ))
                .size(12),
            ];
            if !s.selftext.is_empty() {
                col = col.push(text(truncate(&s.selftext, PREVIEW_CHARS)).size(14));
            }
            col
        }
        StoredItem::Known(ContentItem::Comment(c)) => column![
            button(text("Comment").size(16))
                .style(theme::Button::Text)
                .on_press(Message::CopyLink(c.link.clone())),
            text(format!(
                "{} points | u/{} | {} | r/{}",
                c.score,
                c.author,
                format_time(c.created_at),
                c.subreddit
            ))
            .size(12),
            text(truncate(&c.body, PREVIEW_CHARS)).size(14),
        ],
        StoredItem::Unrecognized { id, type_tag, .. } => column![
            text("Unknown item type").size(16),
            text(format!("{} ({})", id, type_tag)).size(12),
        ],
    };

    container(content.spacing(4)).padding(10).width(Length::Fill).into()
}

const TABLE_COLUMNS: [&str; 10] = [
    "type", "title", "selftext", "body", "score", "url", "link", "created_at", "author", "subreddit",
];

fn table_cells(item: &StoredItem) -> [String; 10] {
    match item {
        StoredItem::Known(ContentItem::Submission(s)) => [
            ContentItem::SUBMISSION_TAG.to_string(),
            s.title.clone(),
            s.selftext.clone(),
            String::new(),
            s.score.to_string(),
            s.url.clone(),
            String::new(),
            format_time(s.created_at),
            s.author.clone(),
            s.subreddit.clone(),
        ],
        StoredItem::Known(ContentItem::Comment(c)) => [
            ContentItem::COMMENT_TAG.to_string(),
            String::new(),
            String::new(),
            c.body.clone(),
            c.score.to_string(),
            String::new(),
            c.link.clone(),
            format_time(c.created_at),
            c.author.clone(),
            c.subreddit.clone(),
        ],
        StoredItem::Unrecognized {
            type_tag,
            subreddit,
            created_at,
            ..
        } => [
            type_tag.clone(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            format_time(*created_at),
            String::new(),
            subreddit.clone(),
        ],
    }
}

fn table_row<'a>(cells: impl IntoIterator<Item = String>, size: u16) -> Row<'a, Message> {
    cells.into_iter().fold(Row::new().spacing(8), |row, cell| {
        row.push(
            text(truncate(&cell, CELL_CHARS))
                .size(size)
                .width(Length::FillPortion(1)),
        )
    })
}

fn view_table(items: &[StoredItem]) -> Element<'_, Message> {
    let header = table_row(TABLE_COLUMNS.iter().map(|c| c.to_string()), 13);
    items
        .iter()
        .fold(Column::new().spacing(6).push(header), |col, item| {
            col.push(table_row(table_cells(item), 12))
        })
        .into()
}

fn view_chart(counts: Vec<(String, usize)>) -> Element<'static, Message> {
    let max = counts.first().map_or(1, |(_, count)| *count).max(1) as f32;
    counts
        .into_iter()
        .fold(
            Column::new().spacing(6).push(text("Items per subreddit (current page)").size(14)),
            |col, (name, count)| {
                col.push(
                    row![
                        text(format!("r/{}", name)).size(13).width(Length::Fixed(180.0)),
                        progress_bar(0.0..=max, count as f32).height(Length::Fixed(14.0)),
                        text(count).size(13).width(Length::Fixed(40.0)),
                    ]
                    .spacing(10)
                    .align_items(Alignment::Center),
                )
            },
        )
        .into()
}
