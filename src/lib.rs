//! QuickPoll API: anonymous polls over REST with live updates pushed over a
//! WebSocket.

pub mod aggregate;
pub mod config;
pub mod entities;
pub mod http;
pub mod models;
pub mod polls;
pub mod realtime;
pub mod state;
