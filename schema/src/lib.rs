//! Records shared by the exam generator and the builder service.
//!
//! Questions mirror rows of the `questions` table; exams mirror entries of the
//! local exam history.
pub mod db;
pub mod exam;
pub mod question;

pub use exam::*;
pub use question::*;
