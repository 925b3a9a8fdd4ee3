pub mod prelude;

pub mod like;
pub mod poll;
pub mod vote;
