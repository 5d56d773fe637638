#![doc = include_str!("../README.md")]

mod error;

pub mod cache;
pub mod checksum;
pub mod composite;
pub mod decode;
pub mod dispatch;
pub mod frame;
pub mod records;
pub mod scan;

pub use error::{Error, Result};
