// src/lib.rs

//! talkscraper library
//!
//! Resumable three-stage harvester for conference talks: discover conference
//! pages, enumerate their talks, then extract each talk's text and rendered
//! footnotes. Progress lives in a SQLite state store so runs can stop and
//! resume at any point.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
