pub mod circuit_breaker;
pub mod reconcile;
pub mod scan_session;
