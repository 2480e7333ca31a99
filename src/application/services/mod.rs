pub mod consumption_processor;
pub mod credit_service;
