mod check;
mod files;
mod rules;

pub use check::check_command;
pub use files::files_command;
pub use rules::rules_command;
