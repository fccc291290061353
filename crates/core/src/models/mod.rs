pub mod analytics;
pub mod asset;
pub mod lot;
pub mod position;
pub mod price;
pub mod settings;
pub mod transaction;
