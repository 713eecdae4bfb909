pub mod analyze;
pub mod backends;
pub mod dispatch;
pub mod extract;
pub mod run;

pub use dispatch::dispatch;
