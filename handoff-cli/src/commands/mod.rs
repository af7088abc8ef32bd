pub mod config;
pub mod issue;
pub mod serve;
