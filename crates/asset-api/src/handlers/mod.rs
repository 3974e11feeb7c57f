//! API request handlers

pub mod assets;
pub mod files;
pub mod pages;
