pub mod config;
pub mod docs;
pub mod history;
pub mod run;
