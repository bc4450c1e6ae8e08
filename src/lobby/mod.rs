//! Lobby - match creation, seating and fan-out of match events

pub mod service;

pub use service::{LobbyService, Seat, SeatGrant};
