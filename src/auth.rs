use std::fmt;
use std::future::{ready, Ready};
use std::str::FromStr;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Farmer,
    Trader,
    Transporter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Trader => "trader",
            Role::Transporter => "transporter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "farmer" => Ok(Role::Farmer),
            "trader" => Ok(Role::Trader),
            "transporter" => Ok(Role::Transporter),
            other => Err(AppError::Unauthenticated(format!("unknown role '{other}'"))),
        }
    }
}

/// Caller identity taken from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthenticatedUser {
    /// The caller's id if they hold `role`.
    pub fn require(&self, role: Role) -> Result<Uuid, AppError> {
        if self.role != role {
            return Err(AppError::Forbidden(format!(
                "this action requires the {role} role"
            )));
        }
        Ok(self.user_id)
    }
}

/// Issues and checks `<userId>.<role>.<hex hmac>` bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, AppError> {
        let claims = format!("{user_id}.{role}");
        let signature = hex::encode(mac(&self.secret, claims.as_bytes())?.finalize().into_bytes());
        Ok(format!("{claims}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let malformed = || AppError::Unauthenticated("malformed bearer token".to_string());

        let mut parts = token.splitn(3, '.');
        let (Some(user), Some(role), Some(signature)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let signature = hex::decode(signature).map_err(|_| malformed())?;

        let claims = format!("{user}.{role}");
        mac(&self.secret, claims.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| AppError::Unauthenticated("bearer token signature mismatch".to_string()))?;

        Ok(AuthenticatedUser {
            user_id: Uuid::parse_str(user).map_err(|_| malformed())?,
            role: role.parse()?,
        })
    }
}

fn mac(secret: &[u8], data: &[u8]) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| AppError::Internal("invalid HMAC secret".to_string()))?;
    mac.update(data);
    Ok(mac)
}

/// Hex HMAC-SHA256 of a webhook body, as the gateway sends it.
pub fn sign_webhook(secret: &str, body: &[u8]) -> Result<String, AppError> {
    Ok(hex::encode(mac(secret.as_bytes(), body)?.finalize().into_bytes()))
}

/// Checks the gateway's signature header against the raw body in constant time.
pub fn verify_webhook_signature(
    secret: &str,
    body: &[u8],
    signature_header: Option<&str>,
) -> Result<(), AppError> {
    let header = signature_header.ok_or_else(|| {
        AppError::Unauthenticated(format!("missing {SIGNATURE_HEADER} header"))
    })?;
    let expected = hex::decode(header.trim())
        .map_err(|_| AppError::Unauthenticated("invalid signature format".to_string()))?;
    mac(secret.as_bytes(), body)?
        .verify_slice(&expected)
        .map_err(|_| AppError::Unauthenticated("webhook signature verification failed".to_string()))
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let signer = req
        .app_data::<web::Data<TokenSigner>>()
        .ok_or_else(|| AppError::Internal("token signer is not configured".to_string()))?;

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;

    signer.verify(token.trim())
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = authenticate(req);
        if let Err(e) = &result {
            log::warn!("{} {} rejected: {e}", req.method(), req.path());
        }
        ready(result)
    }
}
