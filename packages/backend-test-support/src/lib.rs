//! Backend test support utilities
//!
//! Logging initialization, unique test data, and problem-details assertions
//! shared by the arena's unit and integration tests.

pub mod logging;
pub mod problem_details;
pub mod unique_helpers;
