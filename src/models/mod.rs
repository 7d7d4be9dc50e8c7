pub mod action_report;
pub mod assignment;
pub mod permission;
pub mod user;
