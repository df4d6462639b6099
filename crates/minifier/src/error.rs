//! Error types for the minification pipeline
//!
//! None of these reach the page: `minify` turns every variant into
//! "return the input unchanged".

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MinifyError>;

#[derive(Debug, Error)]
pub enum MinifyError {
    #[error("DOM error: {0}")]
    Dom(#[from] dom::DomError),

    #[error("Invalid settings: {0}")]
    Config(#[source] serde_json::Error),

    #[error("Pass {pass} failed: {reason}")]
    Pass { pass: &'static str, reason: String },

    #[error("Minifier panicked: {0}")]
    Panic(String),
}
