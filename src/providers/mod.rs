pub mod github;

pub use github::{GitHubProvider, JobCache, TrendRequest};
