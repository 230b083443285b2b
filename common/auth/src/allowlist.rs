use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Subjects allowed onto the protected routes.
///
/// Sorted once at construction and never mutated afterwards, so shared
/// readers need no lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizedPrincipals {
    subjects: Vec<String>,
}

impl AuthorizedPrincipals {
    pub fn new<I, S>(subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut subjects: Vec<String> = subjects.into_iter().map(Into::into).collect();
        if !subjects.windows(2).all(|pair| pair[0] <= pair[1]) {
            subjects.sort();
        }
        subjects.dedup();
        Self { subjects }
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn contains(&self, subject: &str) -> bool {
        // Err carries the insertion point, which is not a hit.
        self.subjects
            .binary_search_by(|candidate| candidate.as_str().cmp(subject))
            .is_ok()
    }

    pub fn authorize(&self, subject: &str) -> AuthResult<()> {
        if self.contains(subject) {
            return Ok(());
        }
        warn!(subject, "subject is not authorised");
        Err(AuthError::Unauthorized(subject.to_owned()))
    }
}
