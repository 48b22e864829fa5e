pub mod config;
pub mod gather;
pub mod identity;
pub mod measurements;
pub mod output;
pub mod reconcile;
pub mod sources;
