//! # Task Agent
//!
//! A tool-augmented question-answering agent.
//!
//! This library provides:
//! - Attachment preprocessing that turns text, tables, audio and images into
//!   text the model can read
//! - A tool registry (web search, Wikipedia, arXiv, Python execution)
//! - A tool-based agent loop over an OpenAI-compatible chat API
//! - Extraction of the canonical answer after the `FINAL ANSWER:` marker
//!
//! ## Architecture
//!
//! ```text
//! task + attachment -> Preprocessor -> Agent (model <-> tools) -> format_response -> answer
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use task_agent::{agent::Agent, config::Config, format_response, preprocess::Preprocessor};
//!
//! let config = Config::from_env()?;
//! let task = Preprocessor::from_config(&config)
//!     .prepare("How many rows?", Some("data.csv"))
//!     .await;
//! let outcome = Agent::new(&config)?.run_task(&task).await?;
//! println!("{}", outcome.answer);
//! ```

pub mod agent;
pub mod config;
pub mod format;
pub mod llm;
pub mod preprocess;
pub mod tools;

pub use config::Config;
pub use format::format_response;
