pub mod apartment;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod favorites;
pub mod handlers;
pub mod route;
pub mod session;
pub mod store;
pub mod user;
pub mod validation;
pub mod web;
