use std::sync::OnceLock;

use echo_core::EchoError;

/// bcrypt hashing with a fixed cost.
pub struct PasswordHasher {
    cost: u32,
    dummy: OnceLock<String>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy: OnceLock::new(),
        }
    }

    pub fn hash(&self, password: &str) -> anyhow::Result<String> {
        bcrypt::hash(password, self.cost).map_err(|e| {
            EchoError::general_error("Could not hash password")
                .with_source(e.into())
                .into_anyhow()
        })
    }

    /// A malformed stored hash counts as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Spend the same time as a real check when there is no user to check
    /// against.
    pub fn verify_dummy(&self, password: &str) {
        let hash = self.dummy.get_or_init(|| {
            bcrypt::hash("echoblogs-timing-guard", self.cost).unwrap_or_default()
        });
        let _ = bcrypt::verify(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_differ() {
        let hasher = PasswordHasher::new(4);
        let a = hasher.hash("hunter2").unwrap();
        let b = hasher.hash("hunter2").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("hunter2", &a));
        assert!(!hasher.verify("hunter3", &a));
        assert!(!hasher.verify("hunter2", "not-a-hash"));
        hasher.verify_dummy("anything");
    }
}
