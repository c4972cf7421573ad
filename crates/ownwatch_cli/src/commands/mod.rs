pub(crate) mod migrate;
pub(crate) mod reset;
pub(crate) mod serve;
pub(crate) mod shared;
pub(crate) mod status;
pub(crate) mod sync;
pub(crate) mod user;
