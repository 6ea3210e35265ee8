//! Domain layer: pure measurement logic and persistence contracts

pub mod repository;
pub mod service;
