pub mod lookup;
pub mod parse_form;
pub mod sweep;
