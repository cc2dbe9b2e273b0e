//! HTTP API server.
//!
//! Serves proof lookups, token metadata, life lists, leaderboards, and the
//! daily streak over the ledger database maintained by the indexer service.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use lifelist_core::constants::UNIDENTIFIED_NAME;
use lifelist_core::registry::SpeciesRegistry;
use lifelist_core::types::{SeasonId, TokenId};
use lifelist_merkle::proof::InclusionProof;
use lifelist_merkle::store::CommitmentStore;

use crate::db;
use crate::identified::{ChainClient, IdentifiedSet};

/// The request was malformed: bad token id, bad address, unknown season,
/// missing parameter.
pub const ERROR_CODE_INVALID_REQUEST: &str = "invalid_request";
/// The requested entity does not exist (distinct from an empty result).
pub const ERROR_CODE_NOT_FOUND: &str = "not_found";
/// The token's collection has no published commitment artifact yet.
pub const ERROR_CODE_PROOF_UNAVAILABLE: &str = "proof_unavailable";
/// Unexpected server-side failure.
pub const ERROR_CODE_INTERNAL: &str = "internal_error";

/// Default and maximum leaderboard page sizes.
const DEFAULT_LEADERBOARD_LIMIT: u32 = 50;
const MAX_LEADERBOARD_LIMIT: u32 = 100;

/// Error envelope returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error payload.
    pub error: ErrorInfo,
}

/// Machine-readable error details.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code, one of the `ERROR_CODE_*` constants.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorInfo {
                code: code.to_string(),
                message: message.into(),
            },
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, ERROR_CODE_INVALID_REQUEST, message)
}

fn not_found(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::NOT_FOUND, ERROR_CODE_NOT_FOUND, message)
}

fn internal_error(err: anyhow::Error) -> ApiError {
    error!("Internal error: {:#}", err);
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        ERROR_CODE_INTERNAL,
        "Internal server error",
    )
}

/// Runtime configuration for the API service.
#[derive(Debug, Clone)]
pub struct ApiRuntimeConfig {
    /// SQLite database URL shared with the indexer.
    pub database_url: String,
    /// Directory of per-collection species registry files.
    pub species_dir: String,
    /// Directory of per-collection commitment artifacts.
    pub commitments_dir: String,
    /// Socket address to bind.
    pub bind_address: String,
    /// RPC endpoint for identified-token checks; optional.
    pub rpc_url: Option<String>,
    /// Collection contract address; required when `rpc_url` is set.
    pub contract_address: Option<Address>,
}

impl ApiRuntimeConfig {
    /// Read configuration from `LIFELIST_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("LIFELIST_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lifelist.db".to_string());
        let species_dir =
            std::env::var("LIFELIST_SPECIES_DIR").unwrap_or_else(|_| "data/species".to_string());
        let commitments_dir = std::env::var("LIFELIST_COMMITMENTS_DIR")
            .unwrap_or_else(|_| "data/commitments".to_string());
        let bind_address =
            std::env::var("LIFELIST_API_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let rpc_url = std::env::var("LIFELIST_RPC_URL").ok().filter(|s| !s.is_empty());
        let contract_address = match std::env::var("LIFELIST_CONTRACT_ADDRESS") {
            Ok(raw) if !raw.is_empty() => Some(
                Address::from_str(&raw)
                    .with_context(|| format!("Invalid LIFELIST_CONTRACT_ADDRESS: {}", raw))?,
            ),
            _ => None,
        };

        if rpc_url.is_some() != contract_address.is_some() {
            anyhow::bail!(
                "LIFELIST_RPC_URL and LIFELIST_CONTRACT_ADDRESS must be set together"
            );
        }

        Ok(Self {
            database_url,
            species_dir,
            commitments_dir,
            bind_address,
            rpc_url,
            contract_address,
        })
    }

    /// Configuration for in-process tests: no chain client, ephemeral bind.
    pub fn for_test(database_url: &str, species_dir: &str, commitments_dir: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            species_dir: species_dir.to_string(),
            commitments_dir: commitments_dir.to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            rpc_url: None,
            contract_address: None,
        }
    }
}

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ledger database pool.
    pub db: SqlitePool,
    /// Token-to-species mapping.
    pub registry: Arc<SpeciesRegistry>,
    /// Per-collection commitment trees.
    pub commitments: Arc<CommitmentStore>,
    /// Monotonic set of identified tokens.
    pub identified: Arc<IdentifiedSet>,
}

/// Build the router with all dependencies loaded.
pub async fn build_app(config: &ApiRuntimeConfig) -> Result<Router> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .context("Invalid database URL")?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    let registry =
        SpeciesRegistry::from_dir(&config.species_dir).context("Failed to load species registry")?;
    info!("Species registry loaded ({} tokens)", registry.len());

    let commitments = CommitmentStore::from_dir(&config.commitments_dir)
        .context("Failed to load commitment artifacts")?;
    info!("Commitment trees loaded ({} collections)", commitments.len());

    let chain = match (&config.rpc_url, &config.contract_address) {
        (Some(rpc_url), Some(contract_address)) => {
            info!("Chain client enabled for contract {}", contract_address);
            Some(ChainClient::new(rpc_url, *contract_address)?)
        }
        _ => {
            info!("No RPC endpoint configured, tokens will read as unidentified");
            None
        }
    };

    let state = AppState {
        db: pool,
        registry: Arc::new(registry),
        commitments: Arc::new(commitments),
        identified: Arc::new(IdentifiedSet::new(chain)),
    };

    Ok(Router::new()
        .route("/health", get(health))
        .route("/v1/proof/:token_id", get(get_proof))
        .route("/v1/metadata/:token_id", get(get_metadata))
        .route("/v1/life-list/:address", get(get_life_list))
        .route("/v1/leaderboard/points", get(get_points_leaderboard))
        .route("/v1/leaderboard/species", get(get_species_leaderboard))
        .route("/v1/leaderboard/streaks", get(get_streak_leaderboard))
        .route("/v1/streak/:address", get(get_streak).post(post_streak))
        .layer(CorsLayer::permissive())
        .with_state(state))
}

/// Run the API service until ctrl-c or SIGTERM.
pub async fn run(config: ApiRuntimeConfig) -> Result<()> {
    let app = build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

async fn health() -> &'static str {
    "OK"
}

fn parse_token_id(raw: &str) -> std::result::Result<TokenId, ApiError> {
    let value: u32 = raw
        .parse()
        .map_err(|_| bad_request(format!("Invalid token id: {}", raw)))?;
    TokenId::new(value).map_err(|_| bad_request(format!("Token id out of range: {}", value)))
}

fn parse_player_address(raw: &str) -> std::result::Result<Address, ApiError> {
    Address::from_str(raw).map_err(|_| bad_request(format!("Invalid address: {}", raw)))
}

#[derive(Debug, Deserialize)]
struct ProofQuery {
    species_guess: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProofResponse {
    token_id: u32,
    species_guess: String,
    proof: InclusionProof,
    root: B256,
}

/// `GET /v1/proof/:token_id?species_guess=`
///
/// Answers every guess with a structurally valid proof. A wrong guess gets a
/// deterministic decoy, so this endpoint never reveals correctness; only the
/// contract's verification does.
async fn get_proof(
    State(state): State<AppState>,
    Path(raw_token): Path<String>,
    Query(query): Query<ProofQuery>,
) -> ApiResult<ProofResponse> {
    let token_id = parse_token_id(&raw_token)?;

    let species_guess = match query.species_guess {
        Some(guess) if !guess.trim().is_empty() => guess,
        _ => return Err(bad_request("species_guess query parameter is required")),
    };

    // In-range ids without a species mapping are invalid input, not a decoy
    // case; the commitment tree must only answer for committed tokens.
    if state.registry.species_for_token(token_id).is_none() {
        return Err(bad_request(format!(
            "Token {} has no species mapping",
            token_id
        )));
    }

    let proof = match state.commitments.prove_guess(token_id, &species_guess) {
        None => {
            return Err(api_error(
                StatusCode::NOT_FOUND,
                ERROR_CODE_PROOF_UNAVAILABLE,
                "No commitment published for this collection yet",
            ))
        }
        Some(result) => result
            .map_err(|e| internal_error(anyhow::Error::new(e).context("Proof generation failed")))?,
    };

    // prove_guess returned Some, so the tree exists.
    let root = state
        .commitments
        .tree(token_id.collection())
        .map(|tree| tree.root())
        .ok_or_else(|| internal_error(anyhow::anyhow!("Commitment tree vanished")))?;

    Ok(Json(ProofResponse {
        token_id: token_id.value(),
        species_guess,
        proof,
        root,
    }))
}

#[derive(Debug, Serialize)]
struct MetadataResponse {
    token_id: u32,
    identified: bool,
    /// Real species name once identified, otherwise the placeholder.
    name: String,
    family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    species_id: Option<u32>,
}

/// `GET /v1/metadata/:token_id`
///
/// The species name is public only once the token is identified on-chain;
/// until then the placeholder is returned. The family is a published hint.
async fn get_metadata(
    State(state): State<AppState>,
    Path(raw_token): Path<String>,
) -> ApiResult<MetadataResponse> {
    let token_id = parse_token_id(&raw_token)?;

    let Some(species) = state.registry.species_for_token(token_id) else {
        return Err(not_found("Token metadata is not published yet"));
    };

    let identified = state.identified.is_identified(token_id).await;

    Ok(Json(if identified {
        MetadataResponse {
            token_id: token_id.value(),
            identified: true,
            name: species.name.clone(),
            family: species.family.clone(),
            species_id: Some(species.species_id.value()),
        }
    } else {
        MetadataResponse {
            token_id: token_id.value(),
            identified: false,
            name: UNIDENTIFIED_NAME.to_string(),
            family: species.family.clone(),
            species_id: None,
        }
    }))
}

#[derive(Debug, Serialize)]
struct LifeListEntry {
    amount: i64,
    token_id: u32,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    family: Option<String>,
}

#[derive(Debug, Serialize)]
struct LifeListResponse {
    address: String,
    /// Distinct species across all seasons.
    total_species: u64,
    /// Season string to species id to best-scoring record.
    seasons: BTreeMap<String, BTreeMap<u32, LifeListEntry>>,
}

/// `GET /v1/life-list/:address`
async fn get_life_list(
    State(state): State<AppState>,
    Path(raw_address): Path<String>,
) -> ApiResult<LifeListResponse> {
    let address = parse_player_address(&raw_address)?;
    let encoded = db::encode_address(&address);

    let rows = db::life_list(&state.db, &encoded)
        .await
        .map_err(internal_error)?;

    let mut distinct = HashSet::new();
    let mut seasons: BTreeMap<String, BTreeMap<u32, LifeListEntry>> = BTreeMap::new();

    for row in rows {
        let species_id = row.species_id as u32;
        distinct.insert(species_id);

        let species = u32::try_from(row.token_id)
            .ok()
            .and_then(|id| TokenId::new(id).ok())
            .and_then(|token| state.registry.species_for_token(token));

        seasons.entry(row.season).or_default().insert(
            species_id,
            LifeListEntry {
                amount: row.amount,
                token_id: row.token_id as u32,
                timestamp: row.timestamp_u64 as u64,
                name: species.map(|s| s.name.clone()),
                family: species.map(|s| s.family.clone()),
            },
        );
    }

    Ok(Json(LifeListResponse {
        address: encoded,
        total_species: distinct.len() as u64,
        seasons,
    }))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    season: Option<String>,
    address: Option<String>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct LeaderboardEntry {
    rank: i64,
    address: String,
    total: i64,
}

#[derive(Debug, Serialize)]
struct PointsLeaderboardResponse {
    season: String,
    entries: Vec<LeaderboardEntry>,
}

fn leaderboard_limit(limit: Option<u32>) -> std::result::Result<i64, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    if limit == 0 {
        return Err(bad_request("limit must be positive"));
    }
    Ok(limit.min(MAX_LEADERBOARD_LIMIT) as i64)
}

/// `GET /v1/leaderboard/points?season=&address=&limit=`
///
/// Top players by season total. When `address` is given and holds at least
/// one record but falls outside the window, it is appended as one extra
/// entry with its true rank; inside the window it is never duplicated.
async fn get_points_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<PointsLeaderboardResponse> {
    let Some(raw_season) = query.season else {
        return Err(bad_request("season query parameter is required"));
    };
    let season = SeasonId::from_str(&raw_season)
        .map_err(|_| bad_request(format!("Unknown season: {}", raw_season)))?;
    let limit = leaderboard_limit(query.limit)?;

    let rows = db::points_leaderboard(&state.db, season.as_str(), limit)
        .await
        .map_err(internal_error)?;

    let mut entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i as i64 + 1,
            address: row.address,
            total: row.total,
        })
        .collect();

    if let Some(raw_address) = query.address {
        let caller = db::encode_address(&parse_player_address(&raw_address)?);
        if !entries.iter().any(|entry| entry.address == caller) {
            let ranked = db::points_rank(&state.db, season.as_str(), &caller)
                .await
                .map_err(internal_error)?;
            // Players with no records simply do not appear.
            if let Some(ranked) = ranked {
                entries.push(LeaderboardEntry {
                    rank: ranked.rank,
                    address: caller,
                    total: ranked.total,
                });
            }
        }
    }

    Ok(Json(PointsLeaderboardResponse {
        season: season.as_str().to_string(),
        entries,
    }))
}

#[derive(Debug, Deserialize)]
struct SpeciesLeaderboardQuery {
    address: Option<String>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SpeciesLeaderboardEntry {
    rank: i64,
    address: String,
    species_count: i64,
}

#[derive(Debug, Serialize)]
struct SpeciesLeaderboardResponse {
    entries: Vec<SpeciesLeaderboardEntry>,
}

/// `GET /v1/leaderboard/species?address=&limit=`
///
/// Cross-season distinct species counts, same caller-inclusion contract as
/// the points leaderboard.
async fn get_species_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<SpeciesLeaderboardQuery>,
) -> ApiResult<SpeciesLeaderboardResponse> {
    let limit = leaderboard_limit(query.limit)?;

    let rows = db::species_leaderboard(&state.db, limit)
        .await
        .map_err(internal_error)?;

    let mut entries: Vec<SpeciesLeaderboardEntry> = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| SpeciesLeaderboardEntry {
            rank: i as i64 + 1,
            address: row.address,
            species_count: row.species_count,
        })
        .collect();

    if let Some(raw_address) = query.address {
        let caller = db::encode_address(&parse_player_address(&raw_address)?);
        if !entries.iter().any(|entry| entry.address == caller) {
            let ranked = db::species_rank(&state.db, &caller)
                .await
                .map_err(internal_error)?;
            if let Some(ranked) = ranked {
                entries.push(SpeciesLeaderboardEntry {
                    rank: ranked.rank,
                    address: caller,
                    species_count: ranked.total,
                });
            }
        }
    }

    Ok(Json(SpeciesLeaderboardResponse { entries }))
}

#[derive(Debug, Deserialize)]
struct StreakLeaderboardQuery {
    address: Option<String>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct StreakLeaderboardEntry {
    rank: i64,
    address: String,
    current_streak: i64,
}

#[derive(Debug, Serialize)]
struct StreakLeaderboardResponse {
    entries: Vec<StreakLeaderboardEntry>,
}

/// `GET /v1/leaderboard/streaks?address=&limit=`
///
/// Active daily streaks (last counted login today or yesterday, UTC),
/// longest run first, same caller-inclusion contract as the other
/// leaderboards. Broken streaks do not appear until their next touch.
async fn get_streak_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<StreakLeaderboardQuery>,
) -> ApiResult<StreakLeaderboardResponse> {
    let limit = leaderboard_limit(query.limit)?;
    let today = chrono::Utc::now().date_naive();

    let rows = db::streak_leaderboard(&state.db, today, limit)
        .await
        .map_err(internal_error)?;

    let mut entries: Vec<StreakLeaderboardEntry> = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| StreakLeaderboardEntry {
            rank: i as i64 + 1,
            address: row.address,
            current_streak: row.current_streak,
        })
        .collect();

    if let Some(raw_address) = query.address {
        let caller = db::encode_address(&parse_player_address(&raw_address)?);
        if !entries.iter().any(|entry| entry.address == caller) {
            let ranked = db::streak_rank(&state.db, today, &caller)
                .await
                .map_err(internal_error)?;
            if let Some(ranked) = ranked {
                entries.push(StreakLeaderboardEntry {
                    rank: ranked.rank,
                    address: caller,
                    current_streak: ranked.total,
                });
            }
        }
    }

    Ok(Json(StreakLeaderboardResponse { entries }))
}

#[derive(Debug, Serialize)]
struct StreakResponse {
    address: String,
    last_login: String,
    current_streak: u32,
    longest_streak: u32,
    bonus_points_earned: u64,
}

/// `GET /v1/streak/:address`
async fn get_streak(
    State(state): State<AppState>,
    Path(raw_address): Path<String>,
) -> ApiResult<StreakResponse> {
    let address = parse_player_address(&raw_address)?;
    let encoded = db::encode_address(&address);

    let Some(row) = db::get_streak(&state.db, &encoded)
        .await
        .map_err(internal_error)?
    else {
        return Err(not_found("No streak recorded for this address"));
    };

    Ok(Json(StreakResponse {
        address: encoded,
        last_login: row.last_login_date,
        current_streak: row.current_streak as u32,
        longest_streak: row.longest_streak as u32,
        bonus_points_earned: row.bonus_points_earned as u64,
    }))
}

#[derive(Debug, Serialize)]
struct TouchStreakResponse {
    address: String,
    status: &'static str,
    /// Milestone bonus granted by this exact touch.
    change_in_points: u64,
    last_login: String,
    current_streak: u32,
    longest_streak: u32,
    bonus_points_earned: u64,
}

/// `POST /v1/streak/:address`
///
/// Registers a login for today (UTC). Same-day repeats are no-ops and never
/// grant milestone points.
async fn post_streak(
    State(state): State<AppState>,
    Path(raw_address): Path<String>,
) -> ApiResult<TouchStreakResponse> {
    let address = parse_player_address(&raw_address)?;
    let encoded = db::encode_address(&address);
    let today = chrono::Utc::now().date_naive();

    let outcome = db::touch_streak(&state.db, &encoded, today)
        .await
        .map_err(internal_error)?;

    Ok(Json(TouchStreakResponse {
        address: encoded,
        status: outcome.status.as_str(),
        change_in_points: outcome.change_in_points,
        last_login: outcome.record.last_login.to_string(),
        current_streak: outcome.record.current_streak,
        longest_streak: outcome.record.longest_streak,
        bonus_points_earned: outcome.record.bonus_points_earned,
    }))
}
