#![forbid(unsafe_code)]

pub mod analyze;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod openai;
pub mod prompt;
pub mod validate;

#[cfg(test)]
mod test_support;
