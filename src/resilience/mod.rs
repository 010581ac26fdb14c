//! Guarded clients for the dependent microservices.

pub mod cards;
pub mod circuit_breaker;
pub mod client;
pub mod currency;

pub use cards::{CardIssuer, CardsClient};
pub use circuit_breaker::{BreakerConfig, BreakerPermit, CircuitBreaker, CircuitState};
pub use client::{CallFailure, ServiceClient, ServiceUnavailable};
pub use currency::{Conversion, CurrencyClient, CurrencyExchange};
