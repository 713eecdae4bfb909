//! Responsibility boundaries:
//! - run.rs: evaluate flow
//! - prompt.rs: prompt builders/constants only
//! - parse.rs: judge output parse boundary

pub(crate) mod parse;
pub(crate) mod prompt;
pub(crate) mod run;
