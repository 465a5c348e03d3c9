use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::error::OtpError;

pub const CODE_LENGTH: usize = 6;
pub const DEFAULT_RESEND_COOLDOWN_SECS: u64 = 60;

/// A one-time code sent to an email address, with a cooldown before another
/// code may be requested. Times are unix seconds so the challenge can live
/// in the serialized dialogue state.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OtpChallenge {
    pub email: String,
    code: String,
    issued_at: u64,
    cooldown_secs: u64,
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn validate_email(email: &str) -> Result<&str, OtpError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(OtpError::InvalidEmail(email.to_string())),
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

impl OtpChallenge {
    pub fn issue(email: &str, now: u64, cooldown_secs: u64) -> Result<Self, OtpError> {
        Self::with_code(email, generate_code(), now, cooldown_secs)
    }

    fn with_code(email: &str, code: String, now: u64, cooldown_secs: u64) -> Result<Self, OtpError> {
        let email = validate_email(email)?;
        Ok(Self {
            email: email.to_string(),
            code,
            issued_at: now,
            cooldown_secs,
        })
    }

    /// The code as delivered to the user.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn seconds_until_resend(&self, now: u64) -> u64 {
        self.issued_at
            .saturating_add(self.cooldown_secs)
            .saturating_sub(now)
    }

    /// Issues a fresh code for the same address and restarts the cooldown.
    pub fn resend(&self, now: u64) -> Result<Self, OtpError> {
        let remaining = self.seconds_until_resend(now);
        if remaining > 0 {
            return Err(OtpError::Cooldown { remaining });
        }
        Self::issue(&self.email, now, self.cooldown_secs)
    }

    pub fn verify(&self, input: &str) -> Result<(), OtpError> {
        let input = input.trim();
        if input.len() != CODE_LENGTH || !input.chars().all(|c| c.is_ascii_digit()) {
            return Err(OtpError::InvalidFormat(CODE_LENGTH));
        }
        if input != self.code {
            return Err(OtpError::Mismatch);
        }
        Ok(())
    }

    /// `adebayo.smith@gmail.com` becomes `adebay***@gmail.com`.
    pub fn masked_email(&self) -> String {
        match self.email.split_once('@') {
            Some((local, domain)) => {
                let visible: String = local.chars().take(6).collect();
                format!("{}***@{}", visible, domain)
            }
            None => self.email.clone(),
        }
    }
}
