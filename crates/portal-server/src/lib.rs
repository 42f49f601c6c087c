pub mod bootstrap;
pub mod config;
pub mod observability;
pub mod server;

pub use bootstrap::{BootstrapStats, seed_registrations};
pub use config::{AppConfig, BootstrapConfig, LoggingConfig, ServerConfig};
pub use observability::init_tracing;
pub use server::{PortalServer, ServerBuilder, build_app, load_signing_key};
