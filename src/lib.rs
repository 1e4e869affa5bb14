pub mod api;
pub mod cli;
pub mod clients;
pub mod core;
pub mod infra;
pub mod servlets;
