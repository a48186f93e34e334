//! Server module for hostbridge
//!
//! Builds the service routers, attaches middleware, and runs the HTTP
//! listener for each of the two services.

mod init;

pub use init::{run_files, run_terminal};
