mod cache;
mod client;
mod links;
mod provider;
mod types;

pub use cache::JobCache;
pub use provider::{GitHubProvider, TrendRequest};
