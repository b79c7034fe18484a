//! Intersection Simulation Library
//!
//! A four-way signalised intersection with an adaptive, emergency-aware
//! signal arbiter. Runs headless; renderers read `SimSnapshot`s.

pub mod simulation;
