//! Campus Service - sequential admission, employee and request codes plus the
//! fee ledger (term invoices, bulk invoicing, payment statistics).

pub mod codes;
pub mod config;
pub mod grpc;
pub mod ledger;
pub mod models;
pub mod services;
pub mod startup;
