pub mod check_access;
pub mod destroy;
pub mod init;
pub mod up;
pub mod validate;

// These modules should not do much and act mostly as a thunk to handle
// displaying outputs/errors of the real function.
