//! The relay runtime: one poll loop plus detached summary workers.

pub mod poll_loop;
pub mod reply;
pub mod summary_worker;

pub use poll_loop::PollLoop;
pub use summary_worker::summary_task;
