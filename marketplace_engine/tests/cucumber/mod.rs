mod market_world;
mod setups;

pub use market_world::MarketWorld;
