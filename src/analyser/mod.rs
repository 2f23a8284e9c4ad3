//! The core of encrypted search traffic analysis.
//! Leverage request sizes and timing to find the keystrokes of a search query and the
//! website visits that followed it.
pub mod containers;
pub mod core;
pub mod rules;
pub mod scan;
pub mod tokenize;
pub mod utils;
