// src/risk/mod.rs
// Risk: numeric toolkit, portfolio exposure, position-size ladder

pub mod ladder;
pub mod portfolio;
pub mod toolkit;
