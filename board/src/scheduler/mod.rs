// Scheduler driver: the periodic caller of Board::tick

mod driver;

pub use driver::{TickDriver, TickDriverConfig, TickScheduler};
