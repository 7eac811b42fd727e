pub mod auth;
pub mod secure_query;

pub use auth::jwt_auth_middleware;
pub use secure_query::PolicyCompliant;
