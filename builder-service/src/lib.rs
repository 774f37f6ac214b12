pub mod app;
pub mod config;
pub mod db;
pub mod history;
pub mod import;
pub mod render;
