use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::util::normalize_base_url;

/// Body of `POST /api/move`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub direction: String,
    pub count: u32,
    pub has_explicit_count: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Authoritative game state as returned by both the move endpoint and the
/// polling endpoint. Every field except `success` is optional on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_pos: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_map: Option<Vec<Vec<u8>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_grid: Option<Vec<Vec<char>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pearl_collected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_failed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The remote game server. The server is the sole authority on game state;
/// implementations only move bytes.
pub trait GameServer: Send + Sync {
    fn send_move(&self, request: &MoveRequest)
        -> impl Future<Output = Result<ServerSnapshot>> + Send;

    fn fetch_state(&self) -> impl Future<Output = Result<ServerSnapshot>> + Send;
}

/// `GameServer` over HTTP/JSON.
#[derive(Clone)]
pub struct HttpGameServer {
    client: reqwest::Client,
    base_url: String,
}

const USER_AGENT: &str = concat!("bobavim/", env!("CARGO_PKG_VERSION"));

impl HttpGameServer {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the server-rendered game page, used to bootstrap the mirror
    /// from cell attributes without an extra API round trip.
    pub async fn fetch_page(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Blocked moves come back as `{"success": false, ...}`, sometimes with a 4xx
/// status. Any body that parses as a snapshot is a valid answer.
async fn read_snapshot(response: reqwest::Response) -> Result<ServerSnapshot> {
    let status = response.status();
    let body = response.text().await?;
    match serde_json::from_str::<ServerSnapshot>(&body) {
        Ok(snapshot) => Ok(snapshot),
        Err(_) if !status.is_success() => Err(ClientError::Server {
            status: status.as_u16(),
            body,
        }),
        Err(e) => Err(e.into()),
    }
}

impl GameServer for HttpGameServer {
    async fn send_move(&self, request: &MoveRequest) -> Result<ServerSnapshot> {
        let response = self
            .client
            .post(format!("{}/api/move", self.base_url))
            .header("User-Agent", USER_AGENT)
            .json(request)
            .send()
            .await?;
        read_snapshot(response).await
    }

    async fn fetch_state(&self) -> Result<ServerSnapshot> {
        let response = self
            .client
            .get(format!("{}/api/game-state", self.base_url))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .await?;
        read_snapshot(response).await
    }
}
