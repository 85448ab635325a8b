use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::CORRELATION_HEADER;
use crate::domain::fleet::{FleetError, FleetService};
use crate::domain::types::*;

/// Shared application state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<FleetService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    pub version: String,
    pub nodes: usize,
    pub active_runs: usize,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/nodes/", get(list_nodes).post(create_node))
        .route("/nodes/{id}/", get(get_node))
        .route("/nodes/{id}/provision/", post(provision_node))
        .route("/nodes/{id}/heartbeat/", post(heartbeat))
        .route("/links/", get(links))
        .route("/topology/", get(topology))
        .route("/events/", get(events));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(middleware::from_fn(correlation_id))
        .with_state(state)
}

/// Reuse the caller's correlation id or mint one, and echo it on the response.
async fn correlation_id(mut req: Request, next: Next) -> Response {
    let id = match req.headers().get(CORRELATION_HEADER) {
        Some(value) => value.clone(),
        None => {
            let fresh = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            req.headers_mut().insert(CORRELATION_HEADER, fresh.clone());
            fresh
        }
    };
    let mut resp = next.run(req).await;
    resp.headers_mut().insert(CORRELATION_HEADER, id);
    resp
}

fn correlation_of(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
}

fn reject(e: FleetError) -> (StatusCode, String) {
    let status = match e {
        FleetError::NodeNotFound(_) => StatusCode::NOT_FOUND,
        FleetError::InvalidDraft(_) => StatusCode::BAD_REQUEST,
    };
    (status, e.to_string())
}

async fn health(State(state): State<AppState>) -> Json<BackendHealth> {
    Json(BackendHealth {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        nodes: state.fleet.nodes().await.len(),
        active_runs: state
            .fleet
            .runs()
            .await
            .iter()
            .filter(|r| r.state.is_active())
            .count(),
    })
}

async fn list_nodes(State(state): State<AppState>) -> Json<Vec<Node>> {
    Json(state.fleet.nodes().await)
}

async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Node>, (StatusCode, String)> {
    state
        .fleet
        .node(&id)
        .await
        .map(Json)
        .ok_or_else(|| reject(FleetError::NodeNotFound(id)))
}

async fn create_node(
    State(state): State<AppState>,
    Json(draft): Json<NodeDraft>,
) -> Result<(StatusCode, Json<Node>), (StatusCode, String)> {
    state
        .fleet
        .create(draft)
        .await
        .map(|node| (StatusCode::CREATED, Json(node)))
        .map_err(reject)
}

/// 202 for a freshly queued run, 200 when an active run already exists.
async fn provision_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<WorkflowRun>), (StatusCode, String)> {
    let (run, created) = state
        .fleet
        .provision(&id, "anonymous", correlation_of(&headers))
        .await
        .map_err(reject)?;
    let status = if created {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(run)))
}

async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HeartbeatAck>, (StatusCode, String)> {
    state.fleet.heartbeat(&id).await.map(Json).map_err(reject)
}

async fn links(State(state): State<AppState>) -> Json<Vec<Link>> {
    Json(state.fleet.links().await)
}

async fn topology(State(state): State<AppState>) -> Json<TopologyData> {
    Json(state.fleet.topology().await)
}

async fn events(State(state): State<AppState>) -> Json<Vec<EventLog>> {
    Json(state.fleet.events().await)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;
    use crate::config::ApiConfig;
    use crate::fallback::{DataAccess, FallbackPolicy, Source};

    async fn spawn_backend(step_delay: Duration) -> (SocketAddr, Arc<FleetService>) {
        let fleet = Arc::new(FleetService::new(step_delay));
        let app = router(AppState {
            fleet: fleet.clone(),
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, fleet)
    }

    fn access(addr: SocketAddr) -> DataAccess {
        DataAccess::from_config(&ApiConfig {
            base_url: format!("http://{}/api", addr),
            timeout_ms: 1000,
            fallback: FallbackPolicy::Disabled,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn serves_every_read_route() {
        let (addr, _) = spawn_backend(Duration::ZERO).await;
        let data = access(addr);

        let nodes = data.nodes().await.unwrap();
        assert_eq!(nodes.source, Source::Live);
        assert_eq!(nodes.data.len(), 6);

        let node = data.node("5").await.unwrap();
        assert_eq!(node.data.name, "SAT-V1-046 [PROV]");

        assert_eq!(data.links().await.unwrap().data.len(), 4);
        let topology = data.topology().await.unwrap();
        assert_eq!(topology.data.nodes.len(), 6);
        assert!(data.events().await.unwrap().data.is_empty());
    }

    #[tokio::test]
    async fn unknown_node_is_404() {
        let (addr, _) = spawn_backend(Duration::ZERO).await;
        let err = access(addr).node("does-not-exist").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_round_trip_and_validation() {
        let (addr, fleet) = spawn_backend(Duration::ZERO).await;
        let data = access(addr);
        let mut draft = NodeDraft {
            name: "GS-NYC-01".into(),
            node_type: NodeType::Ground,
            environment: Environment::Prod,
            mgmt_ip: Some("10.9.9.9".into()),
            desired_config_version: None,
        };
        let created = data.create_node(&draft).await.unwrap();
        assert_eq!(created.data.name, "GS-NYC-01");
        assert_eq!(fleet.nodes().await.len(), 7);

        draft.name = String::new();
        let err = data.create_node(&draft).await.unwrap_err();
        match err {
            crate::client::ClientError::Status { status, .. } => {
                assert_eq!(status, reqwest::StatusCode::BAD_REQUEST)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn provision_then_refetch_reflects_progress() {
        let (addr, _) = spawn_backend(Duration::from_millis(20)).await;
        let data = access(addr);

        let ack = data.provision_node("4").await.unwrap();
        assert_eq!(ack.source, Source::Live);
        let run = match ack.data {
            ProvisionAck::Workflow(run) => run,
            other => panic!("unexpected ack: {other:?}"),
        };
        assert_eq!(run.state, WorkflowState::Queued);

        let again = data.provision_node("4").await.unwrap();
        match again.data {
            ProvisionAck::Workflow(second) => assert_eq!(second.id, run.id),
            other => panic!("unexpected ack: {other:?}"),
        }

        let mut status = NodeStatus::Unreachable;
        for _ in 0..100 {
            status = data.node("4").await.unwrap().data.status;
            if status == NodeStatus::Healthy {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(status, NodeStatus::Healthy);
    }

    #[tokio::test]
    async fn correlation_id_is_echoed() {
        let (addr, _) = spawn_backend(Duration::ZERO).await;
        let resp = reqwest::Client::new()
            .get(format!("http://{}/health", addr))
            .header(CORRELATION_HEADER, "abc-123")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.headers()[CORRELATION_HEADER], "abc-123");
        let health: BackendHealth = resp.json().await.unwrap();
        assert_eq!(health.nodes, 6);
    }

    #[tokio::test]
    async fn heartbeat_route() {
        let (addr, _) = spawn_backend(Duration::ZERO).await;
        let ack = access(addr).heartbeat("6").await.unwrap();
        assert_eq!(ack.data.current_status, NodeStatus::Healthy);
        assert_eq!(ack.data.status, "heartbeat received");
    }
}
