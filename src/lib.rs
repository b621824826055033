//! Container load planning.
//!
//! Picks a shipping container for a set of carton lines, lays the cartons out
//! inside it and recommends a truck from a fleet snapshot.

pub mod api;
pub mod catalog;
pub mod config;
pub mod container_selector;
pub mod geometry;
pub mod model;
pub mod placement;
pub mod planner;
pub mod truck_selector;
pub mod types;
