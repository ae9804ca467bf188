pub mod article;
pub mod comment;
pub mod db;
pub mod filesystem;
pub mod form;
pub mod global;
pub mod markdown;
pub mod middleware;
pub mod notification;
pub mod orm;
pub mod session;
pub mod template;
pub mod user;
pub mod web;

pub use global::{Config, MainData};
