//! Infers the shape of a search query typed into a live search box from an encrypted
//! packet capture, using only record sizes, timing, and cleartext server names.
pub mod analyser;
pub mod capture;
pub mod config;
pub mod error;
pub mod ui;
