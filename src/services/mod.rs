// Feed and alerting
pub mod activities;
pub mod alerts;

// Shop floor
pub mod machines;
pub mod production_lines;
pub mod quality;

// Production planning
pub mod orders;
pub mod work_orders;

// Stock and customers
pub mod customers;
pub mod inventory;

// Aggregation
pub mod dashboard;
pub mod reports;
