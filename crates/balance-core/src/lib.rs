pub mod config;
pub mod quantity;
pub mod types;

pub use config::{BalanceConfig, CapacitySource, DeviationKind, FrameworkConfig, PluginConfig};
pub use quantity::{Quantity, QuantityError};
pub use types::*;
