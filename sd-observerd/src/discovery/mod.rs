pub mod classify;
pub mod deferred;
pub mod hash;
pub mod local;
pub mod reconcile;
pub mod state;
