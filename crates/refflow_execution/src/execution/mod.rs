pub mod exchange;
pub mod executor;
pub mod operators;
pub mod planner;
