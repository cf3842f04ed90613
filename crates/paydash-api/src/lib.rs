pub mod auth;
pub mod middleware;
pub mod payments;
pub mod users;
