pub mod helpers;
mod money;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, BASIS_POINTS_SCALE};
pub use secret::Secret;
