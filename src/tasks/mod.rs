pub mod processor;
pub mod queue;
pub mod worker;
