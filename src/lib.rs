pub mod config;
pub mod error;
pub mod service;
pub mod router;
pub mod middleware;
pub mod handlers;
pub mod db;
pub mod views;

pub use error::PortalError;
pub use router::{PortalState, portal_router};
