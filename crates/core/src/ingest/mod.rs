pub mod collector;
pub mod economic;
pub mod market;
pub mod news;
