//! Anti-forgery tokens for state-changing admin requests.
//!
//! A token is bound to an action name, a user id and a time tick. Ticks are
//! half a lifespan long, and a token stays valid during the tick it was
//! issued in and the following one.

use crate::option_store::OptionStore;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use rand_distr::Alphanumeric;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

/// Option key the signing secret is persisted under.
pub const NONCE_SECRET_OPTION: &str = "notice_nonce_secret";

const TOKEN_LENGTH: usize = 20;
const SECRET_LENGTH: usize = 64;

type HmacSha256 = Hmac<Sha256>;

/// Which tick a verified token was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceAge {
    Current,
    Previous,
}

pub struct NonceManager {
    options: Arc<dyn OptionStore>,
    lifespan_secs: u64,
}

impl NonceManager {
    pub fn new(options: Arc<dyn OptionStore>, lifespan_secs: u64) -> Self {
        Self {
            options,
            lifespan_secs,
        }
    }

    pub fn create(&self, action: &str, user_id: usize, now: DateTime<Utc>) -> Result<String> {
        let secret = self.secret()?;
        sign(&secret, self.tick(now), action, user_id)
    }

    /// Checks `token` for `action` and `user_id`. Returns None when the token
    /// is empty, forged, or expired. Never writes: with no secret stored yet,
    /// no token can be valid.
    pub fn verify(
        &self,
        token: &str,
        action: &str,
        user_id: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<NonceAge>> {
        if token.is_empty() {
            return Ok(None);
        }
        let Some(secret) = self.stored_secret()? else {
            debug!("Rejected {} token for user {}: no secret yet", action, user_id);
            return Ok(None);
        };
        let tick = self.tick(now);

        for (age, tick) in [(NonceAge::Current, tick), (NonceAge::Previous, tick - 1)] {
            let expected = sign(&secret, tick, action, user_id)?;
            if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
                return Ok(Some(age));
            }
        }
        debug!("Rejected {} token for user {}", action, user_id);
        Ok(None)
    }

    fn tick(&self, now: DateTime<Utc>) -> i64 {
        let half_life = (self.lifespan_secs / 2).max(1) as i64;
        let ts = now.timestamp();
        ts.div_euclid(half_life) + i64::from(ts.rem_euclid(half_life) != 0)
    }

    fn stored_secret(&self) -> Result<Option<String>> {
        Ok(self
            .options
            .get_option(NONCE_SECRET_OPTION)?
            .filter(|secret| !secret.is_empty()))
    }

    fn secret(&self) -> Result<String> {
        if let Some(secret) = self.stored_secret()? {
            return Ok(secret);
        }
        let secret = generate_secret();
        self.options.set_option(NONCE_SECRET_OPTION, &secret)?;
        info!("Generated new anti-forgery secret");
        Ok(secret)
    }
}

fn generate_secret() -> String {
    let rng = rand::rng();
    rng.sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

fn sign(secret: &str, tick: i64, action: &str, user_id: usize) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| anyhow!("Invalid anti-forgery secret"))?;
    mac.update(format!("{}|{}|{}", tick, action, user_id).as_bytes());
    let mut token = hex::encode(mac.finalize().into_bytes());
    token.truncate(TOKEN_LENGTH);
    Ok(token)
}
