pub(crate) mod chat;
pub(crate) mod info;
pub(crate) mod reports;
