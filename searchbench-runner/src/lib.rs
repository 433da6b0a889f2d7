pub mod backend;
pub mod config;
pub mod histogram;
pub mod ingest;
pub mod operation;
pub mod queries;
pub mod report;
pub mod runner;
