//! Core services: credential checks, sessions, accounts and the catalog view.

pub mod accounts;
pub mod catalog;
pub mod password;
pub mod session;
