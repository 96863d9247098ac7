pub mod archs;
pub mod args;
pub mod demo;
pub mod layout;
pub mod marshal;
