//! Likable Config - environment variable names and typed readers
//! shared by the preview supervisor and the host server.

pub mod constants;
pub mod env;
