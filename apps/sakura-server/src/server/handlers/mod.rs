pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod board;
pub(crate) mod users;
