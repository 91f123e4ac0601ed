pub mod forms;
pub mod page;
pub mod views;
