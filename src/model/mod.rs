pub mod clock_event;
pub mod employee;
pub mod interval;
