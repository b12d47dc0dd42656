use std::sync::Arc;

use photosheet_core::admission::AdmissionController;
use photosheet_pipeline::Pipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Ordered image processing stages.
    pub pipeline: Arc<Pipeline>,
    /// Rate limit gate in front of the pipeline.
    pub admission: Arc<AdmissionController>,
}
