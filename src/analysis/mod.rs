// src/analysis/mod.rs
// Market analysis: indicator kernels, swing levels, signal and timing reads

pub mod indicators;
pub mod levels;
pub mod technical;
pub mod timing;
