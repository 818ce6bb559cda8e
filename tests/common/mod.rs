//! Common test utilities for ffmerge integration tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod encoders;
#[allow(dead_code)]
pub mod server;

#[allow(unused_imports)]
pub use config::*;
#[allow(unused_imports)]
pub use encoders::*;
#[allow(unused_imports)]
pub use server::*;
