pub mod directory;
pub mod mpesa_transactions;
pub mod payment;
pub mod transaction;
pub mod user;
pub mod user_profile;
