// src/engine/mod.rs
// Decision synthesis and open-trade management

pub mod coordinator;
pub mod management;
