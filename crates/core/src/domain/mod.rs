pub mod event;
pub mod profile;
pub mod report;
pub mod user;
