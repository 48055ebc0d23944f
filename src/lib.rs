pub mod app;
pub mod audit;
pub mod breaker;
pub mod config;
pub mod gate;
pub mod hooks;
pub mod outcome;
pub mod prompt;
pub mod security;
pub mod shared;
pub mod state;
pub mod tools;
