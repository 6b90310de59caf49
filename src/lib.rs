pub mod command;
pub mod config;
pub mod feed;
pub mod follow;
pub mod ingest;
pub mod storage;
