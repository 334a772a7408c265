//! Per-organization admission control
//!
//! A keyed token-bucket limiter in front of the pipeline. Exceeding the limit
//! is a recoverable outcome (the caller retries later), distinct from
//! duplicate or invalid-signature rejections.

use crate::error::IngestError;
use governor::{DefaultKeyedRateLimiter, Quota};
use std::num::NonZeroU32;
use uuid::Uuid;

pub struct OrgRateLimiter {
    limiter: DefaultKeyedRateLimiter<Uuid>,
    per_minute: u32,
}

impl OrgRateLimiter {
    pub fn new(per_minute: u32) -> Self {
        let cells = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: DefaultKeyedRateLimiter::keyed(Quota::per_minute(cells)),
            per_minute: cells.get(),
        }
    }

    pub fn check(&self, org_id: Uuid) -> Result<(), IngestError> {
        self.limiter
            .check_key(&org_id)
            .map_err(|_| IngestError::RateLimited(org_id))
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_per_organization() {
        let limiter = OrgRateLimiter::new(2);
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();

        assert!(limiter.check(org_a).is_ok());
        assert!(limiter.check(org_a).is_ok());
        assert!(matches!(
            limiter.check(org_a),
            Err(IngestError::RateLimited(id)) if id == org_a
        ));

        // A different organization is unaffected
        assert!(limiter.check(org_b).is_ok());
    }

    #[test]
    fn zero_configures_the_minimum_quota() {
        let limiter = OrgRateLimiter::new(0);
        assert_eq!(limiter.per_minute(), 1);
    }
}
