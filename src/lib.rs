pub mod auth;
pub mod cascade;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod data_types;
pub mod grid;
pub mod loader;
pub mod modal;
pub mod repository;
pub mod selection;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutils;
