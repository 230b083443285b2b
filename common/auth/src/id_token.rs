use std::sync::Arc;

use crate::claims::TokenClaims;
use crate::error::AuthResult;
use crate::policy::ClaimPolicy;
use crate::principal;
use crate::verifier::TokenValidator;

/// Signature primitive plus claim policy, the single entry point used by both
/// the sign-in flow and the protected-route gate.
#[derive(Clone)]
pub struct IdTokenVerifier {
    validator: Arc<dyn TokenValidator>,
    policy: ClaimPolicy,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub subject: String,
    pub claims: TokenClaims,
}

impl IdTokenVerifier {
    pub fn new(validator: Arc<dyn TokenValidator>, policy: ClaimPolicy) -> Self {
        Self { validator, policy }
    }

    pub fn audience(&self) -> &str {
        self.policy.audience()
    }

    pub async fn verify(&self, raw_token: &str) -> AuthResult<VerifiedToken> {
        let claims = self
            .validator
            .validate(raw_token, self.policy.audience())
            .await?;
        let claims = self.policy.check(claims)?;
        let subject = principal::subject(&claims)?.to_owned();
        Ok(VerifiedToken { subject, claims })
    }
}
