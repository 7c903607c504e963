//! Mock diagnostic tools and example plans.
//!
//! The tools simulate a ship's diagnostic suite with configurable artificial
//! delays: most are blocking functions, `scan_systems` is a suspending tool,
//! which together exercise both dispatch paths of the engine. The example
//! plans chain them into runnable demonstrations of argument passing, guards,
//! key findings, and intervention.

mod delay;
mod plans;
mod registry;

pub use delay::DelayConfig;
pub use plans::demo_plans;
pub use registry::demo_registry;
