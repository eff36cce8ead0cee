//! Natural-language query engine collaborators.
//!
//! The dashboard only sees [`Answerer`]; [`OllamaAnswerer`] is the
//! production implementation.

pub mod ollama;
pub mod prompts;

use crate::error::DashResult;
use crate::models::{ResultValue, Table};
use std::future::Future;

pub use ollama::{OllamaAnswerer, OllamaConfig};

/// Answers an instruction about a table snapshot.
pub trait Answerer {
    fn answer(
        &self,
        instruction: &str,
        table: &Table,
    ) -> impl Future<Output = DashResult<ResultValue>> + Send;
}
