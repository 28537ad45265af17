//! Bet settlement.
//!
//! The one part of the service with real domain rules: grading a
//! market/selection pair against a final result, sizing stakes, and
//! reconciling bankrolls when pending bets resolve.

pub mod bankroll;
pub mod grader;
pub mod reconciler;
