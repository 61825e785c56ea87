use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;

use shared_config::{AppConfig, SchedulingPolicy, StorageBackend};
use shared_models::auth::{Actor, Role};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            storage_backend: StorageBackend::Memory,
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            scheduling: SchedulingPolicy::default(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: i64,
    pub role: String,
    pub clinic_id: Option<i64>,
}

impl TestUser {
    pub fn new(id: i64, role: &str, clinic_id: Option<i64>) -> Self {
        Self {
            id,
            role: role.to_string(),
            clinic_id,
        }
    }

    pub fn admin(id: i64) -> Self {
        Self::new(id, "admin", None)
    }

    pub fn doctor(id: i64) -> Self {
        Self::new(id, "doctor", None)
    }

    pub fn patient(id: i64) -> Self {
        Self::new(id, "patient", None)
    }

    pub fn clinic_staff(id: i64, clinic_id: i64) -> Self {
        Self::new(id, "clinic_staff", Some(clinic_id))
    }

    pub fn email(&self) -> String {
        format!("{}-{}@example.com", self.role, self.id)
    }

    /// Panics on roles the identity layer would reject; tests only.
    pub fn to_actor(&self) -> Actor {
        let role: Role = self.role.parse().expect("test user has a known role");
        Actor {
            id: self.id,
            role,
            clinic_id: self.clinic_id,
            email: Some(self.email()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let mut payload = json!({
            "sub": user.id.to_string(),
            "email": user.email(),
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });
        if let Some(clinic_id) = user.clinic_id {
            payload["app_metadata"] = json!({ "clinic_id": clinic_id });
        }

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    pub fn bearer(user: &TestUser, config: &TestConfig) -> String {
        format!("Bearer {}", Self::create_test_token(user, &config.jwt_secret, None))
    }
}
