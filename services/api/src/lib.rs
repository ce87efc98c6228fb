pub mod adapters;
pub mod assets;
pub mod config;
pub mod error;
pub mod media;
pub mod web;
