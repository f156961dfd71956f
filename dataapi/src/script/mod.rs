//! Data code: the bracket-call scripting language used to drive API
//! integration tests.
//!
//! This module implements the full pipeline:
//!
//! - Bracket-aware scanning of lines and argument lists ([`scan`])
//! - Arithmetic, comparison, and regex expressions ([`expr`])
//! - Line evaluation with cascading errors ([`Interpreter`])
//! - Built-ins for variables, control flow, assertions, and requests
//!   ([`builtins`])
//! - Per-file and per-directory runs folded into a [`ReportTree`]
//!   ([`runner`], [`report`])
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use dataapi::script::Interpreter;
//! use dataapi::scripts::DiskScripts;
//! use dataapi::transport::UreqTransport;
//!
//! let mut interp = Interpreter::new(
//!     Arc::new(UreqTransport::new()),
//!     Arc::new(DiskScripts::new("configs/dataapi")),
//! );
//! interp.eval("[Set(x, 6, int)][PrintF(\"%v\", x * 7)]").unwrap();
//! assert_eq!(interp.output, vec!["42"]);
//! ```

pub mod builtins;
pub mod env;
pub mod error;
pub mod expr;
pub mod interp;
pub mod report;
pub mod runner;
pub mod scan;
pub mod value;

// Re-exports for convenience.
pub use env::Environment;
pub use error::EvalError;
pub use expr::EvalContext;
pub use interp::Interpreter;
pub use report::{Label, ReportTree};
pub use value::Value;
