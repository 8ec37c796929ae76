pub mod properties;

pub use properties::{EnvProperties, FundingPolicy, Properties};
