pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod monitor;
pub mod observability;
pub mod resilience;
pub mod service;
pub mod storage;

pub use config::Config;
pub use domain::{Account, Iban};
pub use service::AccountService;
