// src/strategy/mod.rs

pub mod compliance;
