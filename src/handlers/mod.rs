// src/handlers/mod.rs

pub mod admin;
pub mod comments;
pub mod likes;
pub mod posts;
pub mod profile;
pub mod stories;
