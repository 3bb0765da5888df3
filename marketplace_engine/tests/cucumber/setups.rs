use cucumber::given;

use crate::cucumber::{market_world::MarketplaceSystem, MarketWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketWorld) {
    let system = MarketplaceSystem::new().await;
    world.system = Some(system);
}
