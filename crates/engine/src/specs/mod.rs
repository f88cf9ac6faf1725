//! Built-in task spec variants.

mod function;
mod simple;
mod sub_workflow;
mod wait_for_trigger;

pub use function::Function;
pub use simple::{Simple, StartTask};
pub use sub_workflow::SubWorkflow;
pub use wait_for_trigger::WaitForTrigger;
