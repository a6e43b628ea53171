#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

pub mod api;
pub mod cache;
pub mod cli;
pub mod core;
pub mod error;
pub mod prelude;
pub mod quantity;
pub mod tables;
