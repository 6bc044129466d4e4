//! Vitals pipeline library
//!
//! This crate provides:
//! - Bounded reading histories and the shared state store
//! - An address-keyed message bus with one task per agent
//! - Reading generation, efficiency prediction and recording agents
//! - Regression model adapters (ONNX and linear weights)
//! - Access tokens, chart rendering, health checks and observability

pub mod agents;
pub mod auth;
pub mod buffer;
pub mod bus;
pub mod chart;
pub mod health;
pub mod models;
pub mod observability;
pub mod persistence;
pub mod predictor;
pub mod store;

pub use agents::{PipelineBuilder, Telemetry};
pub use auth::{AuthError, Credentials, TokenService};
pub use chart::{ChartPoint, ChartRenderer, LineChartRenderer, RenderError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use store::{PlotError, StateStore, StoreSnapshot};
