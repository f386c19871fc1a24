pub mod giving_service;
pub mod mpesa_service;
pub mod phone;
