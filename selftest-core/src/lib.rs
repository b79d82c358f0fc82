#![no_std]

// Shared logic for the bench self-test controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing the collaborator traits the other crates
// implement.

pub mod arbiter;
pub mod config;
pub mod console;
pub mod link;
pub mod sequencer;
pub mod sequences;
pub mod task;
pub mod telemetry;
