pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod startup;

pub use error::GatewayError;
pub use router::{Route, WorkflowRouter};
pub use startup::{AppState, Application, Backends};
