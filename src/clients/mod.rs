pub mod database;
pub mod fcm;
pub mod health;
pub mod memory;
pub mod router;
pub mod web_push;
