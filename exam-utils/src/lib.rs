//! Exam Builder Utility Functions
//!
//! ## Current API
//!
//! - Normalize stored options and correct answers
//! - Shuffle multiple-choice options without losing the answer key
//! - Sample a question pool by type and difficulty
//! - Assemble and validate generated exams
//! - Group and percentage statistics
//!
pub mod codec;
pub mod error;
pub mod generation;
pub mod random;
pub mod selection;
pub mod shuffle;
pub mod stats;
