pub mod cli;
pub mod config;
pub mod error;
pub mod indexer;
pub mod model;
pub mod resolver;
pub mod util;
