pub mod action_reports;
pub mod assignments;
pub mod auth;
pub mod authz;
pub mod health;
pub mod users;
