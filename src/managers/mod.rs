pub mod entities;
pub mod health;
pub mod profiles;
pub mod reports;
