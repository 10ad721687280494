//! Order service for the BookBazaar online bookstore: session carts, an order
//! ledger and a checkout flow settled through a payment gateway.

pub mod api;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod db;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod money;
pub mod order;
pub mod routes;
pub mod schema;
