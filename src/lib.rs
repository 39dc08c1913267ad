pub mod aggregator;
pub mod alert;
pub mod chart;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod feed;
pub mod live;
pub mod logging;
pub mod monitor;
pub mod report;
pub mod series;
pub mod simulator;
pub mod stats;
pub mod store;
pub mod tail;
pub mod tick;
