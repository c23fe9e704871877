mod action;
mod report;
mod session;

pub use action::Action;
pub use session::run;
