pub mod arm;
pub mod config;
pub mod control;
pub mod drive;
pub mod geometry;
pub mod intake;
pub mod messages;
pub mod robot;
pub mod runtime;
pub mod sim;
