//! HTTP API for the Agora node
//!
//! The caller's identity is read from the `x-caller` header. Authenticating
//! that identity is the job of whatever sits in front of this API.

use agora_ballot::{BallotSnapshot, EventRecord, Proposal, Voter};
use agora_core::{Address, AgoraError, AgoraResult, ErrorKind, ProposalId, WorkflowStatus};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::runtime::NodeRuntime;

/// Header carrying the caller's hex address
pub const CALLER_HEADER: &str = "x-caller";

/// API state containing node runtime
pub type ApiState = Arc<NodeRuntime>;

/// API response wrapper
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Voter registration request
#[derive(Deserialize)]
pub struct AddVoterRequest {
    pub address: String,
}

/// Voter registration response
#[derive(Serialize, Deserialize)]
pub struct AddVoterResponse {
    pub address: String,
}

/// Proposal submission request
#[derive(Deserialize)]
pub struct AddProposalRequest {
    pub description: String,
}

/// Proposal submission response
#[derive(Serialize, Deserialize)]
pub struct AddProposalResponse {
    pub proposal_id: ProposalId,
}

/// Vote request
#[derive(Deserialize)]
pub struct VoteRequest {
    pub proposal_id: ProposalId,
}

/// Vote response
#[derive(Serialize, Deserialize)]
pub struct VoteResponse {
    pub voter: String,
    pub proposal_id: ProposalId,
}

/// Workflow transition response
#[derive(Serialize, Deserialize)]
pub struct WorkflowResponse {
    pub status: WorkflowStatus,
    pub status_code: u8,
    pub winning_proposal_id: Option<ProposalId>,
}

/// Winner response
#[derive(Serialize, Deserialize)]
pub struct WinnerResponse {
    pub proposal_id: ProposalId,
    pub proposal: Proposal,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub since: Option<u64>,
}

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    let enable_cors = state.config().api.enable_cors;

    let mut router = Router::new()
        // Health
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/events", get(get_events))
        // Voters
        .route("/voters", post(add_voter))
        .route("/voters/:address", get(get_voter))
        // Proposals
        .route("/proposals", post(add_proposal))
        .route("/proposals/:id", get(get_proposal))
        // Voting
        .route("/votes", post(set_vote))
        .route("/workflow/:step", post(advance_workflow))
        .route("/winner", get(get_winner))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router
}

/// HTTP status for a failed ballot call
pub fn status_code_for(err: &AgoraError) -> StatusCode {
    match err.kind() {
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::WrongPhase => StatusCode::CONFLICT,
        ErrorKind::Rejected => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Config => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: AgoraResult<T>) -> (StatusCode, Json<ApiResponse<T>>) {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))),
        Err(e) => (status_code_for(&e), Json(ApiResponse::err(e))),
    }
}

fn parse_address(s: &str) -> AgoraResult<Address> {
    Address::from_hex(s).map_err(|e| AgoraError::InvalidAddress(format!("{}: {}", s, e)))
}

fn caller(headers: &HeaderMap) -> AgoraResult<Address> {
    let value = headers
        .get(CALLER_HEADER)
        .ok_or_else(|| AgoraError::InvalidAddress(format!("missing {} header", CALLER_HEADER)))?;
    let value = value
        .to_str()
        .map_err(|e| AgoraError::InvalidAddress(e.to_string()))?;
    parse_address(value)
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ballot status
async fn status(State(runtime): State<ApiState>) -> impl IntoResponse {
    let snapshot: BallotSnapshot = runtime.ballot().snapshot();
    Json(ApiResponse::ok(snapshot))
}

/// Event log
async fn get_events(
    State(runtime): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let events: Vec<EventRecord> = runtime.ballot().events_since(query.since.unwrap_or(0));
    Json(ApiResponse::ok(events))
}

/// Register a voter
async fn add_voter(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<AddVoterRequest>,
) -> impl IntoResponse {
    let result = caller(&headers).and_then(|caller| {
        let voter = parse_address(&req.address)?;
        runtime.ballot().add_voter(&caller, voter)?;
        Ok(AddVoterResponse {
            address: voter.to_hex(),
        })
    });
    respond(result)
}

/// Read a voter record
async fn get_voter(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let result: AgoraResult<Voter> = caller(&headers).and_then(|caller| {
        let voter = parse_address(&address)?;
        runtime.ballot().get_voter(&caller, &voter)
    });
    respond(result)
}

/// Submit a proposal
async fn add_proposal(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<AddProposalRequest>,
) -> impl IntoResponse {
    let result = caller(&headers).and_then(|caller| {
        let proposal_id = runtime.ballot().add_proposal(&caller, &req.description)?;
        Ok(AddProposalResponse { proposal_id })
    });
    respond(result)
}

/// Read one proposal
async fn get_proposal(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let result = caller(&headers).and_then(|caller| {
        let id: ProposalId = id
            .parse()
            .map_err(|_| AgoraError::InvalidRequest(format!("invalid proposal id: {}", id)))?;
        runtime.ballot().get_one_proposal(&caller, id)
    });
    respond(result)
}

/// Cast a vote
async fn set_vote(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<VoteRequest>,
) -> impl IntoResponse {
    let result = caller(&headers).and_then(|caller| {
        runtime.ballot().set_vote(&caller, req.proposal_id)?;
        Ok(VoteResponse {
            voter: caller.to_hex(),
            proposal_id: req.proposal_id,
        })
    });
    respond(result)
}

/// Advance the workflow one step
async fn advance_workflow(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    Path(step): Path<String>,
) -> impl IntoResponse {
    let result = caller(&headers).and_then(|caller| {
        let ballot = runtime.ballot();
        let (status, winning_proposal_id) = match step.as_str() {
            "start-proposals" => (ballot.start_proposals_registering(&caller)?, None),
            "end-proposals" => (ballot.end_proposals_registering(&caller)?, None),
            "start-voting" => (ballot.start_voting_session(&caller)?, None),
            "end-voting" => (ballot.end_voting_session(&caller)?, None),
            "tally" => {
                let winner = ballot.tally_votes(&caller)?;
                (WorkflowStatus::VotesTallied, Some(winner))
            }
            other => {
                return Err(AgoraError::InvalidRequest(format!("unknown workflow step: {}", other)))
            }
        };
        info!("Workflow step {} applied, now {}", step, status);
        Ok(WorkflowResponse {
            status,
            status_code: status.code(),
            winning_proposal_id,
        })
    });
    respond(result)
}

/// Winning proposal
async fn get_winner(State(runtime): State<ApiState>) -> impl IntoResponse {
    let ballot = runtime.ballot();
    let result = ballot.winning_proposal().map(|proposal| WinnerResponse {
        proposal_id: ballot.winning_proposal_id(),
        proposal,
    });
    respond(result)
}

/// Start API server
pub async fn start_api_server(runtime: Arc<NodeRuntime>, listen_addr: &str) -> anyhow::Result<()> {
    let router = create_router(runtime);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("API server listening on {}", listen_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
