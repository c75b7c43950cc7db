//! Registration bearer tokens.
//!
//! A registration token is an Argon2id PHC string of the hub's registration
//! secret. Relays present it once, at self-registration; the hub checks it
//! against the raw secret it holds.

use crate::identity::IdentityError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

/// Argon2id cost parameters for registration tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCost {
    /// Memory in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Number of passes.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    Params::DEFAULT_P_COST
}

impl Default for RegistrationCost {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl RegistrationCost {
    /// Cheapest parameters Argon2 accepts. Only for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }

    fn hasher(&self) -> Result<Argon2<'static>, IdentityError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| IdentityError::Hashing(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Whether `params` costs no more than this in every dimension.
    fn admits(&self, params: &Params) -> bool {
        params.m_cost() <= self.memory_kib
            && params.t_cost() <= self.iterations
            && params.p_cost() <= self.parallelism
    }
}

/// Hash the registration secret into a PHC string a relay can present.
pub fn issue_registration_token(
    secret: &str,
    cost: &RegistrationCost,
) -> Result<String, IdentityError> {
    if secret.is_empty() {
        return Err(IdentityError::EmptySecret);
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = cost
        .hasher()?
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| IdentityError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check a presented PHC string against the raw registration secret.
///
/// Parameters are read from the PHC string itself, so tokens issued under
/// an older, cheaper cost stay valid. Tokens asking for more memory, passes
/// or lanes than `cost` are rejected before any hashing happens.
pub fn verify_registration_token(token: &str, secret: &str, cost: &RegistrationCost) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(token) else {
        return false;
    };
    let Ok(params) = Params::try_from(&parsed) else {
        return false;
    };
    if !cost.admits(&params) {
        return false;
    }
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify() {
        let cost = RegistrationCost::minimal();
        let token = issue_registration_token("reg-secret", &cost).unwrap();
        assert!(token.starts_with("$argon2id$"));
        assert!(verify_registration_token(&token, "reg-secret", &cost));
        assert!(!verify_registration_token(&token, "other-secret", &cost));
    }

    #[test]
    fn tokens_are_salted() {
        let cost = RegistrationCost::minimal();
        let a = issue_registration_token("reg-secret", &cost).unwrap();
        let b = issue_registration_token("reg-secret", &cost).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn cost_is_embedded_in_token() {
        let cost = RegistrationCost {
            memory_kib: 64,
            iterations: 2,
            parallelism: 1,
        };
        let token = issue_registration_token("reg-secret", &cost).unwrap();
        assert!(token.contains("m=64,t=2,p=1"));
        assert!(verify_registration_token(&token, "reg-secret", &cost));
    }

    #[test]
    fn garbage_is_rejected() {
        let cost = RegistrationCost::minimal();
        assert!(!verify_registration_token("", "reg-secret", &cost));
        assert!(!verify_registration_token("reg-secret", "reg-secret", &cost));
        assert!(!verify_registration_token("$argon2id$broken", "reg-secret", &cost));
    }

    #[test]
    fn cheaper_token_is_accepted() {
        let token = issue_registration_token("reg-secret", &RegistrationCost::minimal()).unwrap();
        let current = RegistrationCost {
            memory_kib: 64,
            iterations: 2,
            parallelism: 1,
        };
        assert!(verify_registration_token(&token, "reg-secret", &current));
    }

    #[test]
    fn inflated_cost_is_rejected_without_hashing() {
        let cost = RegistrationCost::minimal();
        let token = issue_registration_token("reg-secret", &cost).unwrap();
        let minimal = format!(
            "m={},t={},p={}",
            cost.memory_kib, cost.iterations, cost.parallelism
        );
        assert!(token.contains(&minimal));

        // Hashing at these parameters would take tens of seconds.
        let inflated = token.replace(&minimal, "m=262144,t=8,p=1");
        let started = std::time::Instant::now();
        assert!(!verify_registration_token(&inflated, "reg-secret", &cost));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        let wide = token.replace(&minimal, &format!("m={},t=1,p=4", cost.memory_kib.max(32)));
        assert!(!verify_registration_token(&wide, "reg-secret", &cost));
    }

    #[test]
    fn empty_secret_rejected() {
        assert_eq!(
            issue_registration_token("", &RegistrationCost::minimal()),
            Err(IdentityError::EmptySecret)
        );
    }

    #[test]
    fn invalid_cost_is_error() {
        let cost = RegistrationCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
        };
        assert!(matches!(
            issue_registration_token("reg-secret", &cost),
            Err(IdentityError::Hashing(_))
        ));
    }
}
