pub mod agent;
pub mod app;
pub mod stdio;
pub mod tooling;
