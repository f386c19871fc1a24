pub(crate) mod auth;
pub(crate) mod directory;
pub(crate) mod mpesa_handlers;
pub(crate) mod user_profile;
