pub mod config;
pub mod db;
pub mod http;
pub mod ingest;
pub mod sheet;
pub mod store;
pub mod view;
