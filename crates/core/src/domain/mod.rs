pub mod display;
pub mod line_item;
