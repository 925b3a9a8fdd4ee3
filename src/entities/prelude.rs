#![allow(unused_imports)]

pub use super::like::Entity as Like;
pub use super::poll::Entity as Poll;
pub use super::vote::Entity as Vote;
