pub mod allowlist;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod id_token;
pub mod jwks;
pub mod policy;
pub mod principal;
pub mod session;
pub mod verifier;

pub use allowlist::AuthorizedPrincipals;
pub use claims::TokenClaims;
pub use config::{JwtConfig, GOOGLE_ISSUERS, GOOGLE_JWKS_URL};
pub use error::{AuthError, AuthResult};
pub use extractors::{Principal, SessionToken};
pub use id_token::{IdTokenVerifier, VerifiedToken};
pub use jwks::JwksFetcher;
pub use policy::{ClaimPolicy, GOOGLE_ISSUER_SUFFIX};
pub use principal::SignInIdentity;
pub use session::{SessionCredential, SESSION_COOKIE, TOKEN_LIFETIME};
pub use verifier::{JwtVerifier, KeyRing, JwtVerifierBuilder, TokenValidator};
