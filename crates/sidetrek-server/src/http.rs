use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use sidetrek_core::{ProjectLayout, ServerConfig};
use sidetrek_dbt::{DbtRunner, GraphBuilder};
use tokio::net::TcpListener;

use crate::session;
use crate::watcher::WatchOptions;

/// Shared by every connection
pub struct AppState {
    pub(crate) builder: Arc<GraphBuilder>,
    pub(crate) models_dir: PathBuf,
    pub(crate) watch: WatchOptions,
    pub(crate) run_on_connect: bool,
}

impl AppState {
    pub fn new(layout: &ProjectLayout, config: &ServerConfig) -> Self {
        let runner = DbtRunner::new(&layout.dbt_project_dir)
            .with_program(&config.dbt.program)
            .with_parse_timeout(config.dbt.parse_timeout())
            .with_run_timeout(config.dbt.run_timeout())
            .with_fail_fast(config.dbt.fail_fast);

        Self {
            builder: Arc::new(GraphBuilder::new(runner, &layout.manifest_path)),
            models_dir: layout.models_dir.clone(),
            watch: WatchOptions::from(&config.watcher),
            run_on_connect: config.dbt.run_on_connect,
        }
    }
}

/// Every path upgrades to the dev session; anything else is a 500
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().fallback(upgrade).with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

async fn upgrade(
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => ws
            .on_failed_upgrade(|e| tracing::warn!(error = %e, "websocket upgrade failed"))
            .on_upgrade(move |socket| session::run(socket, state)),
        Err(rejection) => {
            tracing::debug!(%rejection, "rejected non-websocket request");
            (StatusCode::INTERNAL_SERVER_ERROR, "Upgrade failed").into_response()
        }
    }
}
