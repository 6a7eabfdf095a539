//! HTTP surface of the task board.

pub mod board_http;

pub use board_http::{ApiError, BoardHttpServer, CLIENT_ID_HEADER};
