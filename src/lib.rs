pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod presentation;
pub mod processing;
pub mod series;
pub mod stats;
pub mod upwelling;
