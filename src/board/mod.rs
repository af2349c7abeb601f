//! Board data: schema, GraphQL client and the context fetcher.
//!
//! A single query asks for every configured board's name and first page of
//! items. The decoded boards are flattened by [`format::format_boards`] into
//! the plain-text context the prompt is grounded on.

pub mod cache;
pub mod format;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use self::cache::ContextCache;
use self::format::{format_boards, ColumnDefaults};

/// Prefix of the context text substituted when a fetch fails.
pub const FETCH_ERROR_PREFIX: &str = "Error fetching board data";

/// Errors raised while fetching board data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Connection, TLS or timeout failure
    Transport(String),
    /// Non-success HTTP status
    Status { status: u16, body: String },
    /// The endpoint answered with a GraphQL `errors` array
    GraphQl(Vec<String>),
    /// The body did not match the expected board schema
    Decode(String),
    /// Invalid client setup
    Config(String),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::Transport(e) => write!(f, "request failed: {e}"),
            BoardError::Status { status, .. } => write!(f, "board API returned status {status}"),
            BoardError::GraphQl(messages) => write!(f, "board API errors: {}", messages.join("; ")),
            BoardError::Decode(e) => write!(f, "unexpected board payload: {e}"),
            BoardError::Config(e) => write!(f, "invalid board client configuration: {e}"),
        }
    }
}

impl std::error::Error for BoardError {}

impl From<reqwest::Error> for BoardError {
    fn from(err: reqwest::Error) -> Self {
        BoardError::Transport(err.to_string())
    }
}

/// Top-level GraphQL response.
#[derive(Deserialize, Debug, Default)]
pub struct BoardsEnvelope {
    #[serde(default)]
    pub data: Option<BoardsData>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct BoardsData {
    #[serde(default)]
    pub boards: Vec<Board>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GraphQlError {
    pub message: String,
}

/// A named collection of tracked items.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Board {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub items_page: ItemsPage,
}

impl Board {
    pub fn items(&self) -> &[Item] {
        &self.items_page.items
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ItemsPage {
    #[serde(default)]
    pub items: Vec<Item>,
}

/// A single task or deal record.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub column_values: Vec<ColumnValue>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ColumnValue {
    /// Display text; `null` or blank when the cell is empty
    #[serde(default)]
    pub text: Option<String>,
    pub column: Column,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Column {
    pub title: String,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

/// Builds the boards query for `board_ids`, asking for up to `limit` items per board.
pub fn boards_query(board_ids: &[u64], limit: u32) -> String {
    let ids = board_ids
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{{ boards(ids: [{ids}]) {{ id name items_page(limit: {limit}) {{ \
         items {{ name column_values {{ text column {{ title }} }} }} }} }} }}"
    )
}

/// Client for the board GraphQL endpoint.
pub struct BoardClient {
    api_url: Url,
    api_key: String,
    board_ids: Vec<u64>,
    page_size: u32,
    client: Client,
}

impl BoardClient {
    pub fn new(
        api_url: &str,
        api_key: impl Into<String>,
        board_ids: Vec<u64>,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, BoardError> {
        let api_url = Url::parse(api_url)
            .map_err(|e| BoardError::Config(format!("invalid URL '{api_url}': {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_url,
            api_key: api_key.into(),
            board_ids,
            page_size,
            client,
        })
    }

    /// Fetches every configured board in one request, in API response order.
    pub async fn fetch_boards(&self) -> Result<Vec<Board>, BoardError> {
        let query = boards_query(&self.board_ids, self.page_size);
        log::trace!("board query: {query}");

        // The board API takes the raw key, without a `Bearer` prefix.
        let response = self
            .client
            .post(self.api_url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .json(&GraphQlRequest { query: &query })
            .send()
            .await?;

        let status = response.status();
        log::debug!("board API HTTP status: {status}");
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BoardError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: BoardsEnvelope =
            serde_json::from_str(&body).map_err(|e| BoardError::Decode(e.to_string()))?;
        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            return Err(BoardError::GraphQl(
                errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        let boards = envelope
            .data
            .ok_or_else(|| BoardError::Decode("missing `data` field".to_string()))?
            .boards;
        log::debug!("fetched {} boards", boards.len());
        Ok(boards)
    }
}

/// Source of the context text for one turn.
///
/// Never fails: an unavailable upstream is reported as context text so the
/// conversation can still proceed.
#[async_trait]
pub trait ContextSource: Send {
    async fn context(&mut self) -> String;
}

/// Fetches, formats and caches board context.
pub struct BoardContextFetcher {
    client: BoardClient,
    defaults: ColumnDefaults,
    cache: ContextCache,
}

impl BoardContextFetcher {
    pub fn new(client: BoardClient, defaults: ColumnDefaults, cache_ttl: Duration) -> Self {
        Self {
            client,
            defaults,
            cache: ContextCache::new(cache_ttl),
        }
    }

    /// Fetches and formats the boards, serving a fresh cached copy when possible.
    pub async fn try_context(&mut self) -> Result<String, BoardError> {
        if let Some(cached) = self.cache.get() {
            log::debug!("serving board context from cache");
            return Ok(cached.to_string());
        }
        let boards = self.client.fetch_boards().await?;
        let text = format_boards(&boards, &self.defaults);
        self.cache.put(text.clone());
        Ok(text)
    }
}

#[async_trait]
impl ContextSource for BoardContextFetcher {
    async fn context(&mut self) -> String {
        match self.try_context().await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("board fetch failed: {e}");
                format!("{FETCH_ERROR_PREFIX}: {e}")
            }
        }
    }
}
