pub mod controller;
pub mod ledger;
pub mod model;
pub mod service;
