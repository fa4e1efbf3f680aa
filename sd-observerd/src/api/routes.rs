use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::watch;
use crate::state_manager::StateHandle;
use shared::protocol::API_PREFIX;
use shared::types::{DiscoverySnapshot, Host, ListedService, ServiceInstance, ServiceQuery, ServiceTypeName};

#[derive(Clone)]
pub struct AppState {
    pub state: StateHandle,
    pub hash_rx: watch::Receiver<String>,
    pub listing_rx: watch::Receiver<Vec<ListedService>>,
    pub type_names_rx: watch::Receiver<Vec<ServiceTypeName>>,
}

#[derive(Deserialize)]
pub struct InstanceQuery {
    #[serde(rename = "type")]
    pub service_type: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/snapshot/hash", get(get_hash))
        .route("/instances", get(get_instances))
        .route("/instances/:raw_name", get(get_instance))
        .route("/hosts", get(get_hosts))
        .route("/hosts/:name/queries", get(get_host_queries))
        .route("/lister", get(get_listing))
        .route("/lister/types", get(get_type_names));

    Router::new()
        .nest(API_PREFIX, routes)
        .with_state(state)
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    tracing::error!("Failed to read discovery state: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_snapshot(State(state): State<AppState>) -> Result<Json<DiscoverySnapshot>, StatusCode> {
    state.state.snapshot().await.map(Json).map_err(internal_error)
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.hash_rx.borrow().clone()
}

async fn get_instances(
    State(state): State<AppState>,
    Query(params): Query<InstanceQuery>,
) -> Result<Json<Vec<ServiceInstance>>, StatusCode> {
    let snapshot = state.state.snapshot().await.map_err(internal_error)?;

    let instances = match params.service_type {
        Some(service_type) => snapshot
            .instances
            .into_iter()
            .filter(|i| i.service_type == service_type)
            .collect(),
        None => snapshot.instances,
    };
    Ok(Json(instances))
}

async fn get_instance(
    State(state): State<AppState>,
    Path(raw_name): Path<String>,
) -> Result<Json<ServiceInstance>, StatusCode> {
    state
        .state
        .instance(raw_name)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_hosts(State(state): State<AppState>) -> Result<Json<Vec<Host>>, StatusCode> {
    state
        .state
        .snapshot()
        .await
        .map(|snapshot| Json(snapshot.hosts))
        .map_err(internal_error)
}

async fn get_host_queries(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<ServiceQuery>>, StatusCode> {
    state
        .state
        .queries_for_host(name)
        .await
        .map(Json)
        .map_err(internal_error)
}

async fn get_listing(State(state): State<AppState>) -> Json<Vec<ListedService>> {
    Json(state.listing_rx.borrow().clone())
}

async fn get_type_names(State(state): State<AppState>) -> Json<Vec<ServiceTypeName>> {
    Json(state.type_names_rx.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};
    use crate::capture::CapturedDatagram;
    use crate::discovery::state::DiscoveryState;
    use crate::testutil::PacketBuilder;

    async fn app_state() -> AppState {
        let (hash_tx, hash_rx) = watch::channel(String::new());
        let (_listing_tx, listing_rx) = watch::channel(vec![ListedService {
            name: "printer".to_string(),
            ..Default::default()
        }]);
        let (_type_names_tx, type_names_rx) = watch::channel(vec![ServiceTypeName {
            service_type: "_ipp._tcp".to_string(),
            description: "Internet Printer".to_string(),
        }]);
        let handle = StateHandle::spawn(DiscoveryState::new(None), hash_tx);

        let payload = PacketBuilder::response()
            .ptr("_airplay._tcp.local", "Living Room._airplay._tcp.local")
            .ptr("_http._tcp.local", "nas._http._tcp.local")
            .a("livingroom.local", Ipv4Addr::new(10, 0, 0, 5))
            .build();
        handle
            .ingest(CapturedDatagram {
                src: SocketAddr::from(([10, 0, 0, 5], 5353)),
                local: SocketAddr::from(([0, 0, 0, 0], 5353)),
                payload,
            })
            .await
            .unwrap();
        let query = PacketBuilder::query().question_ptr("_raop._tcp.local").build();
        handle
            .ingest(CapturedDatagram {
                src: SocketAddr::from(([10, 0, 0, 5], 5353)),
                local: SocketAddr::from(([0, 0, 0, 0], 5353)),
                payload: query,
            })
            .await
            .unwrap();

        AppState {
            state: handle,
            hash_rx,
            listing_rx,
            type_names_rx,
        }
    }

    #[tokio::test]
    async fn test_get_instances_filters_by_type() {
        let state = app_state().await;

        let Json(all) = get_instances(State(state.clone()), Query(InstanceQuery { service_type: None }))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let Json(airplay) = get_instances(
            State(state),
            Query(InstanceQuery { service_type: Some("_airplay._tcp".to_string()) }),
        )
        .await
        .unwrap();
        assert_eq!(airplay.len(), 1);
        assert_eq!(airplay[0].instance_name, "Living Room");
    }

    #[tokio::test]
    async fn test_get_instance_not_found() {
        let state = app_state().await;
        let result = get_instance(State(state), Path("missing._http._tcp.local".to_string())).await;
        assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_host_queries() {
        let state = app_state().await;
        let Json(queries) = get_host_queries(State(state), Path("livingroom.local".to_string()))
            .await
            .unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].service_type, "_raop._tcp");
    }

    #[tokio::test]
    async fn test_get_listing_and_hash() {
        let state = app_state().await;
        let Json(listing) = get_listing(State(state.clone())).await;
        assert_eq!(listing[0].name, "printer");
        let Json(types) = get_type_names(State(state.clone())).await;
        assert_eq!(types[0].description, "Internet Printer");

        let Json(snapshot) = get_snapshot(State(state.clone())).await.unwrap();
        assert_eq!(snapshot.hosts.len(), 1);
        assert!(!get_hash(State(state)).await.is_empty());
    }
}
