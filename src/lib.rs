pub mod announce;
pub mod api;
pub mod arena;
pub mod config;
pub mod db;
pub mod flavor;
pub mod info;
pub mod labels;
pub mod ledger;
pub mod metrics;
pub mod royale;
