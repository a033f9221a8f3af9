pub mod actions;
pub mod envelope;
pub mod google;
pub mod health;
pub mod memory;
pub mod scheduler;
