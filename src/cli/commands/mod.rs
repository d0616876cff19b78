//! CLI command implementations.

mod config;
mod delete;
mod doctor;
mod ingest;
mod list;
mod serve;
mod show;

pub use config::run_config;
pub use delete::run_delete;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use list::run_list;
pub use serve::run_serve;
pub use show::run_show;
