//! Smile scoring and progression engine.
//!
//! `workflows::smiles` turns a face detection into a scored daily log and keeps each
//! user's cumulative total and rank tier in step; `workflows::ranking` builds the
//! friends, monthly and all-time leaderboards from the same store.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
