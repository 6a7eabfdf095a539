//! Task board HTTP server.
//!
//! JSON endpoints for registering agents, posting tasks and competing for
//! them. Errors are returned as `{ "error": ..., "code": ... }`.

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{Agent, AgentRegistration, HormoneLevels, NewTask, ServerConfig, Task};
use crate::domain::ports::BoardStore;
use crate::services::{BoardCoordinator, Operation};

/// Header carrying the caller identity used for rate limiting.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Identity used when a request names neither a client nor an agent.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Query string for `GET /tasks/hot`.
#[derive(Debug, Deserialize)]
pub struct HotTasksParams {
    /// Requested result count. Zero is rejected and values above 100 are clamped.
    #[serde(default = "default_hot_limit")]
    pub limit: usize,
}

const fn default_hot_limit() -> usize {
    10
}

/// Body of `POST /tasks/{id}/claim`.
#[derive(Debug, Deserialize)]
pub struct ClaimTaskRequest {
    /// Claiming agent.
    pub agent_id: Uuid,
}

/// Body of `POST /tasks/{id}/complete`.
#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    /// Agent that holds the claim.
    pub agent_id: Uuid,
    /// Work product, stored verbatim. Defaults to an empty object.
    #[serde(default = "empty_output")]
    pub output: serde_json::Value,
}

fn empty_output() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Service banner for `GET /`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BannerResponse {
    /// Always `operational`.
    pub status: String,
    /// Service name.
    pub system: String,
}

/// Reply to `POST /agents/register`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAgentResponse {
    /// Stable id for the codename.
    pub agent_id: Uuid,
    /// Registered codename.
    pub codename: String,
    /// `registered` for a new agent, `refreshed` for an existing codename.
    pub status: String,
    /// Current dopamine level.
    pub dopamine_level: f64,
}

/// Public view of an agent.
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Agent id.
    pub id: Uuid,
    /// Unique codename.
    pub codename: String,
    /// Team name.
    pub team: String,
    /// Role within the team.
    pub role: String,
    /// Specialization tags.
    pub specialization: BTreeSet<String>,
    pub models_access: BTreeSet<String>,
    /// Incentive levels by hormone name.
    pub hormone_levels: HormoneLevels,
    /// Claims won.
    pub tasks_claimed: u64,
    /// Tasks completed.
    pub tasks_completed: u64,
    /// Completed over claimed, 0 before the first claim.
    pub success_rate: f64,
    /// Rank on the Fibonacci ladder.
    pub fibonacci_level: u8,
    /// First registration time.
    pub created_at: DateTime<Utc>,
    /// Last registration or ledger write.
    pub last_heartbeat: DateTime<Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(a: Agent) -> Self {
        Self {
            id: a.id,
            codename: a.codename,
            team: a.team,
            role: a.role,
            specialization: a.specialization,
            models_access: a.models_access,
            hormone_levels: a.hormone_levels,
            tasks_claimed: a.tasks_claimed,
            tasks_completed: a.tasks_completed,
            success_rate: a.success_rate,
            fibonacci_level: a.fibonacci_level.value(),
            created_at: a.created_at,
            last_heartbeat: a.last_heartbeat,
        }
    }
}

/// Reply to `GET /agents`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentListResponse {
    /// Agents, newest first.
    pub agents: Vec<AgentResponse>,
    /// Number of agents returned.
    pub count: usize,
}

/// Public view of a task.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    /// Task id.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Category label.
    pub category: String,
    /// Caller-assigned priority.
    pub priority: i32,
    /// Reward paid on completion.
    pub dopamine_reward: f64,
    /// Perspectives the task asks for.
    pub perspectives_required: u32,
    /// Perspectives gathered so far.
    pub perspectives_collected: u32,
    /// `open`, `claimed` or `complete`.
    pub status: String,
    /// Claimant, kept after completion.
    pub assigned_to: Option<Uuid>,
    /// Set when the claim won.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Set on completion.
    pub completed_at: Option<DateTime<Utc>>,
    /// Completion output.
    pub output: Option<serde_json::Value>,
    /// Ranking score as of this read.
    pub hot_score: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last transition time.
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            category: t.category,
            priority: t.priority,
            dopamine_reward: t.dopamine_reward,
            perspectives_required: t.perspectives_required,
            perspectives_collected: t.perspectives_collected,
            status: t.status.as_str().to_string(),
            assigned_to: t.assigned_to,
            claimed_at: t.claimed_at,
            completed_at: t.completed_at,
            output: t.output,
            hot_score: t.hot_score,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// Reply to `POST /tasks`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    /// Id of the new task.
    pub task_id: Uuid,
    /// Always `created`.
    pub status: String,
    /// Reward paid on completion.
    pub dopamine_reward: f64,
    /// Initial ranking score.
    pub hot_score: f64,
}

/// Reply to `GET /tasks/hot`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HotTasksResponse {
    /// Open tasks, hottest first.
    pub tasks: Vec<TaskResponse>,
    /// Number of tasks returned.
    pub count: usize,
}

/// Reply to a winning claim.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    /// Always `claimed`.
    pub status: String,
    /// Claimed task.
    pub task_id: Uuid,
    /// Codename of the claiming agent.
    pub agent: String,
    /// Anticipation bonus just credited.
    pub dopamine_boost: f64,
    /// Level after the bonus.
    pub dopamine_level: f64,
    /// Reward waiting on completion.
    pub reward_on_completion: f64,
}

/// Reply to a successful completion.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteResponse {
    /// Always `complete`.
    pub status: String,
    /// Completed task.
    pub task_id: Uuid,
    /// Completion reward just credited.
    pub dopamine_reward: f64,
    /// Completion reward plus the earlier claim bonus.
    pub total_boost: f64,
    /// Level after the reward.
    pub dopamine_level: f64,
    /// Agent's completed count after this task.
    pub tasks_completed: u64,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Stable machine-readable code.
    pub code: String,
}

/// A domain error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(DomainError::Validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(DomainError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(DomainError::Validation(rejection.body_text()))
    }
}

/// HTTP status for a domain error.
pub fn status_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) | DomainError::NotAssigned { .. } => StatusCode::BAD_REQUEST,
        DomainError::AgentNotFound(_) | DomainError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict { .. } | DomainError::InvalidState { .. } => StatusCode::CONFLICT,
        DomainError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::DatabaseError(_) | DomainError::SerializationError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "request failed");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        });

        let mut response = (status, body).into_response();
        if let DomainError::RateLimited { retry_after_secs, .. } = &self.0 {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }
        response
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Rate-limit identity: client header, then acting agent, then anonymous.
pub fn request_identity(headers: &HeaderMap, agent_id: Option<Uuid>) -> String {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .or_else(|| agent_id.map(|id| id.to_string()))
        .unwrap_or_else(|| ANONYMOUS_IDENTITY.to_string())
}

struct AppState<S: BoardStore> {
    coordinator: BoardCoordinator<S>,
}

/// Task board HTTP server.
pub struct BoardHttpServer<S: BoardStore + 'static> {
    config: ServerConfig,
    coordinator: BoardCoordinator<S>,
}

impl<S: BoardStore + 'static> BoardHttpServer<S> {
    /// Wrap a coordinator for serving over HTTP.
    pub fn new(coordinator: BoardCoordinator<S>, config: ServerConfig) -> Self {
        Self { config, coordinator }
    }

    /// Build the router.
    pub fn router(self) -> Router {
        let state = Arc::new(AppState { coordinator: self.coordinator });

        let app = Router::new()
            .route("/", get(banner))
            .route("/health", get(health_check))
            // Agents
            .route("/agents/create", post(register_agent::<S>))
            .route("/agents/list", get(list_agents::<S>))
            .route("/agents/{id}", get(get_agent::<S>))
            // Tasks
            .route("/tasks/create", post(create_task::<S>))
            .route("/tasks/hot", get(list_hot_tasks::<S>))
            .route("/tasks/{id}", get(get_task::<S>))
            .route("/tasks/{id}/claim", post(claim_task::<S>))
            .route("/tasks/{id}/complete", post(complete_task::<S>))
            .with_state(state);

        if self.config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.router();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "task board listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// Handler functions

async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        status: "operational".to_string(),
        system: "Phoenix Task Board".to_string(),
    })
}

async fn health_check() -> &'static str {
    "OK"
}

async fn register_agent<S: BoardStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Result<Json<AgentRegistration>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterAgentResponse>)> {
    let Json(registration) = body?;
    let coordinator = &state.coordinator;
    coordinator
        .admit(&request_identity(&headers, None), Operation::RegisterAgent)
        .await?;

    let upsert = coordinator.register_agent(registration).await?;
    let (status, label) = if upsert.created {
        (StatusCode::CREATED, "registered")
    } else {
        (StatusCode::OK, "refreshed")
    };

    Ok((
        status,
        Json(RegisterAgentResponse {
            agent_id: upsert.agent.id,
            dopamine_level: upsert.agent.dopamine(),
            codename: upsert.agent.codename,
            status: label.to_string(),
        }),
    ))
}

async fn list_agents<S: BoardStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> ApiResult<Json<AgentListResponse>> {
    let coordinator = &state.coordinator;
    coordinator
        .admit(&request_identity(&headers, None), Operation::ListAgents)
        .await?;

    let agents: Vec<AgentResponse> = coordinator
        .list_agents()
        .await?
        .into_iter()
        .map(AgentResponse::from)
        .collect();
    let count = agents.len();
    Ok(Json(AgentListResponse { agents, count }))
}

async fn get_agent<S: BoardStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<AgentResponse>> {
    let Path(id) = id?;
    let coordinator = &state.coordinator;
    coordinator
        .admit(&request_identity(&headers, None), Operation::GetAgent)
        .await?;

    Ok(Json(coordinator.get_agent(id).await?.into()))
}

async fn create_task<S: BoardStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Result<Json<NewTask>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateTaskResponse>)> {
    let Json(new_task) = body?;
    let coordinator = &state.coordinator;
    coordinator
        .admit(&request_identity(&headers, None), Operation::CreateTask)
        .await?;

    let task = coordinator.create_task(new_task).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateTaskResponse {
            task_id: task.id,
            status: "created".to_string(),
            dopamine_reward: task.dopamine_reward,
            hot_score: task.hot_score,
        }),
    ))
}

async fn list_hot_tasks<S: BoardStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    params: Result<Query<HotTasksParams>, QueryRejection>,
) -> ApiResult<Json<HotTasksResponse>> {
    let Query(params) = params?;
    let coordinator = &state.coordinator;
    coordinator
        .admit(&request_identity(&headers, None), Operation::ListHot)
        .await?;

    let tasks: Vec<TaskResponse> = coordinator
        .list_hot(params.limit)
        .await?
        .into_vec()
        .into_iter()
        .map(TaskResponse::from)
        .collect();
    let count = tasks.len();
    Ok(Json(HotTasksResponse { tasks, count }))
}

async fn get_task<S: BoardStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<TaskResponse>> {
    let Path(id) = id?;
    let coordinator = &state.coordinator;
    coordinator
        .admit(&request_identity(&headers, None), Operation::GetTask)
        .await?;

    Ok(Json(coordinator.get_task(id).await?.into()))
}

async fn claim_task<S: BoardStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ClaimTaskRequest>, JsonRejection>,
) -> ApiResult<Json<ClaimResponse>> {
    let Path(task_id) = id?;
    let Json(req) = body?;
    let coordinator = &state.coordinator;
    coordinator
        .admit(&request_identity(&headers, Some(req.agent_id)), Operation::ClaimTask)
        .await?;

    let receipt = coordinator.claim_task(task_id, req.agent_id).await?;
    Ok(Json(ClaimResponse {
        status: "claimed".to_string(),
        task_id,
        dopamine_boost: receipt.dopamine_boost(),
        dopamine_level: receipt.reward.level,
        reward_on_completion: receipt.reward_on_completion(),
        agent: receipt.agent.codename,
    }))
}

async fn complete_task<S: BoardStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<CompleteTaskRequest>, JsonRejection>,
) -> ApiResult<Json<CompleteResponse>> {
    let Path(task_id) = id?;
    let Json(req) = body?;
    let coordinator = &state.coordinator;
    coordinator
        .admit(&request_identity(&headers, Some(req.agent_id)), Operation::CompleteTask)
        .await?;

    let receipt = coordinator.complete_task(task_id, req.agent_id, req.output).await?;
    Ok(Json(CompleteResponse {
        status: "complete".to_string(),
        task_id,
        dopamine_reward: receipt.reward.amount,
        total_boost: receipt.total_boost,
        dopamine_level: receipt.reward.level,
        tasks_completed: receipt.agent.tasks_completed,
    }))
}
