// src/lib.rs

//! SchoolScout Discovery Library

pub mod aggregator;
pub mod connectors;
pub mod crawler;
pub mod error;
pub mod fetch;
pub mod models;
pub mod store;
pub mod utils;
