pub mod config;
pub mod format;
pub mod host;
pub mod ignore;
pub mod model;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod validator;
pub mod walker;

pub use validator::{FieldValidator, run_full_validation};
