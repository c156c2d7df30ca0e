pub mod config;
pub mod dataset;
pub mod db;
pub mod domain;
pub mod error;
pub mod prepare;
