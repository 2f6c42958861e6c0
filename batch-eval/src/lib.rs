pub mod types;
pub mod traits;
pub mod utils;
pub mod retry;
pub mod entities;
pub mod results;
pub mod config;
pub mod client;
pub mod tester;

pub use types::*;
pub use traits::{BatchConfiguration, BatchTestClient};
pub use config::LuisConfiguration;
pub use client::HttpBatchTestClient;
pub use retry::RetryPolicy;
pub use tester::BatchTester;
