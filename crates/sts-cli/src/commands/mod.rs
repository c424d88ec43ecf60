//! Command implementations.

pub mod duration;
pub mod encode;
pub mod issue;
pub mod validate;

pub use duration::run_duration;
pub use encode::run_encode;
pub use issue::run_issue;
pub use validate::run_validate;
