pub(crate) mod auth;
pub(crate) mod directory;
pub(crate) mod mpesa;
pub(crate) mod user_profile;
