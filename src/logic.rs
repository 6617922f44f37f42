pub mod interpret;
pub mod locate;
pub mod mutate;
pub mod scan;
