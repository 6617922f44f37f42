pub mod catalog;
pub mod document;
pub mod path;
pub mod property;
pub mod tree;
