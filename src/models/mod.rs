pub mod endpoint;
pub mod fcm;
pub mod health;
pub mod notification;
pub mod payload;
pub mod response;
pub mod status;
pub mod validation;
