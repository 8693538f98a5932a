//! Core handy library (session, request client, form workflow, pages).

pub mod api;
pub mod blob;
pub mod categories;
pub mod client;
pub mod config;
pub mod logging;
pub mod pages;
pub mod session;
pub mod workflow;
