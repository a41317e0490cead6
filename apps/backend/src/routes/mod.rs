pub mod auth;
pub mod pet;
pub mod practice;
pub mod progress;
