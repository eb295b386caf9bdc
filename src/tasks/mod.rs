pub mod repeating;
pub mod ticker;
