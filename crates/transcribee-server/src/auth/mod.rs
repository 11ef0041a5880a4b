//! Authorization: reading credentials off a request and resolving them
//! into an [`AuthLevel`] for a target document (`SPEC_FULL.md` §4).

pub mod credentials;
pub mod resolver;

pub use credentials::PresentedCredentials;
pub use resolver::{
    authenticate_admin, authenticate_user, authenticate_worker, resolve_document_auth,
    AuthContext, AuthLevel,
};
