pub mod benchmark_service;
pub mod catalogue_service;
pub mod history_service;
pub mod performance_service;
pub mod position_service;
