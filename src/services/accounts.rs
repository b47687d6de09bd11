use chrono::Utc;
use sea_orm::{Set, SqlErr};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password, unusable_password_hash, verify_password};
use crate::auth::{AuthService, GoogleCredential, GoogleIdentityVerifier};
use crate::db::DbPool;
use crate::entities::user::{self, ActiveModel as UserActiveModel, UserRole};
use crate::errors::ServiceError;
use crate::repositories::user_repository::UserRepository;

/// Public part of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl From<&user::Model> for UserSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Returned by every sign-in endpoint
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserSummary,
    /// Bearer token for the `Authorization` header
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha todos os campos"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "E-mail inválido"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha todos os campos"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUserInfo {
    pub access_token: Option<String>,
}

/// Either a One Tap `credential` or a popup-flow `userInfo.accessToken`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    pub credential: Option<String>,
    pub user_info: Option<GoogleUserInfo>,
}

impl GoogleLoginRequest {
    fn into_credential(self) -> Option<GoogleCredential> {
        let non_blank = |s: String| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(token) = self.credential.and_then(non_blank) {
            return Some(GoogleCredential::IdToken(token));
        }
        self.user_info
            .and_then(|info| info.access_token)
            .and_then(non_blank)
            .map(GoogleCredential::AccessToken)
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration and sign-in
#[derive(Clone)]
pub struct AccountService {
    users: UserRepository,
    auth: Arc<AuthService>,
    google: Arc<dyn GoogleIdentityVerifier>,
}

impl AccountService {
    pub fn new(
        db_pool: Arc<DbPool>,
        auth: Arc<AuthService>,
        google: Arc<dyn GoogleIdentityVerifier>,
    ) -> Self {
        Self {
            users: UserRepository::new(db_pool),
            auth,
            google,
        }
    }

    fn respond(&self, user: &user::Model) -> Result<AuthResponse, ServiceError> {
        Ok(AuthResponse {
            user: UserSummary::from(user),
            token: self.auth.issue_token(user.id, user.role)?,
        })
    }

    fn new_account(name: String, email: String, password_hash: String) -> UserActiveModel {
        let now = Utc::now();
        UserActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(UserRole::Customer),
            phone: Set(None),
            cpf: Set(None),
            birthdate: Set(None),
            address_street: Set(None),
            address_number: Set(None),
            address_complement: Set(None),
            address_neighborhood: Set(None),
            address_city: Set(None),
            address_state: Set(None),
            address_zip: Set(None),
            preferences: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    /// Creates a CUSTOMER account and signs it in
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        let request = RegisterRequest {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            password: request.password,
        };
        if request.name.is_empty() || request.email.is_empty() || request.password.is_empty() {
            return Err(ServiceError::ValidationError(
                "Preencha todos os campos".to_string(),
            ));
        }
        request.validate()?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(email_taken());
        }

        let hash = hash_password(&request.password)?;
        // a concurrent registration can still win between the lookup and the insert
        let user = self
            .users
            .create(Self::new_account(request.name, request.email, hash))
            .await
            .map_err(duplicate_email_as_validation)?;
        info!(user_id = %user.id, "account registered");
        metrics::counter!("accounts.registered", 1);
        self.respond(&user)
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Credenciais inválidas".to_string());
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(invalid());
        }

        let user = self.users.find_by_email(&email).await?.ok_or_else(invalid)?;
        if !verify_password(&request.password, &user.password_hash) {
            warn!(user_id = %user.id, "failed login attempt");
            metrics::counter!("accounts.login_failures", 1);
            return Err(invalid());
        }
        self.respond(&user)
    }

    /// Signs in with Google, creating the account on first use
    #[instrument(skip(self, request))]
    pub async fn google_login(
        &self,
        request: GoogleLoginRequest,
    ) -> Result<AuthResponse, ServiceError> {
        let credential = request
            .into_credential()
            .ok_or_else(|| ServiceError::ValidationError("Token Google ausente".to_string()))?;
        let profile = self.google.verify(&credential).await?;
        let email = normalize_email(&profile.email);

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                let name = profile
                    .name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| email.clone());
                let user = self
                    .users
                    .create(Self::new_account(name, email, unusable_password_hash()?))
                    .await?;
                info!(user_id = %user.id, "account created through Google sign-in");
                metrics::counter!("accounts.registered", 1, "provider" => "google");
                user
            }
        };
        self.respond(&user)
    }
}

fn email_taken() -> ServiceError {
    ServiceError::ValidationError("E-mail já cadastrado".to_string())
}

/// Maps the unique index on `users.email` to the same error as the lookup
fn duplicate_email_as_validation(err: ServiceError) -> ServiceError {
    match &err {
        ServiceError::DatabaseError(db_err)
            if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
        {
            warn!("registration lost a race on the e-mail index");
            email_taken()
        }
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, GoogleProfile};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use mockall::mock;
    use std::time::Duration;

    mock! {
        pub Google {}

        #[async_trait]
        impl GoogleIdentityVerifier for Google {
            async fn verify(&self, credential: &GoogleCredential) -> Result<GoogleProfile, ServiceError>;
        }
    }

    fn auth() -> Arc<AuthService> {
        Arc::new(AuthService::new(AuthConfig::new(
            "test-secret".into(),
            Duration::from_secs(7 * 24 * 3600),
        )))
    }

    async fn service(google: MockGoogle) -> (AccountService, Arc<AuthService>) {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .expect("connect");
        crate::db::run_migrations(&db).await.expect("migrate");
        let auth = auth();
        (
            AccountService::new(Arc::new(db), auth.clone(), Arc::new(google)),
            auth,
        )
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Maria".into(),
            email: email.into(),
            password: "segredo1".into(),
        }
    }

    #[tokio::test]
    async fn insert_conflict_on_email_reads_as_already_registered() {
        let (service, _) = service(MockGoogle::new()).await;
        service
            .register(register_request("rafa@example.com"))
            .await
            .unwrap();

        // what a registration that passed the lookup concurrently runs into
        let conflict = service
            .users
            .create(AccountService::new_account(
                "Rafa".into(),
                "rafa@example.com".into(),
                "x".into(),
            ))
            .await
            .unwrap_err();
        assert_matches!(
            duplicate_email_as_validation(conflict),
            ServiceError::ValidationError(msg) if msg == "E-mail já cadastrado"
        );

        let other = ServiceError::InternalError("boom".into());
        assert_matches!(
            duplicate_email_as_validation(other),
            ServiceError::InternalError(_)
        );
    }

    #[tokio::test]
    async fn register_then_login() {
        let (service, auth) = service(MockGoogle::new()).await;

        let registered = service
            .register(register_request("Maria@Example.com "))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "maria@example.com");
        assert_eq!(registered.user.role, UserRole::Customer);
        let claims = auth.validate_token(&registered.token).unwrap();
        assert_eq!(claims.sub, registered.user.id.to_string());

        let logged_in = service
            .login(LoginRequest {
                email: "maria@example.com".into(),
                password: "segredo1".into(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (service, _) = service(MockGoogle::new()).await;
        service
            .register(register_request("maria@example.com"))
            .await
            .unwrap();

        let mut second = register_request("MARIA@example.com");
        second.password = "outra-senha".into();
        assert_matches!(
            service.register(second).await,
            Err(ServiceError::ValidationError(msg)) if msg == "E-mail já cadastrado"
        );

        // original password still works
        assert!(service
            .login(LoginRequest {
                email: "maria@example.com".into(),
                password: "segredo1".into(),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn incomplete_or_malformed_registration_is_rejected() {
        let (service, _) = service(MockGoogle::new()).await;

        let mut missing_name = register_request("a@example.com");
        missing_name.name = "  ".into();
        assert_matches!(
            service.register(missing_name).await,
            Err(ServiceError::ValidationError(_))
        );

        assert_matches!(
            service.register(register_request("not-an-email")).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let (service, _) = service(MockGoogle::new()).await;
        service
            .register(register_request("maria@example.com"))
            .await
            .unwrap();

        for (email, password) in [
            ("maria@example.com", "errada"),
            ("ninguem@example.com", "segredo1"),
            ("", ""),
        ] {
            assert_matches!(
                service
                    .login(LoginRequest {
                        email: email.into(),
                        password: password.into(),
                    })
                    .await,
                Err(ServiceError::Unauthorized(msg)) if msg == "Credenciais inválidas"
            );
        }
    }

    #[tokio::test]
    async fn google_login_creates_the_account_once() {
        let mut google = MockGoogle::new();
        google
            .expect_verify()
            .withf(|c| *c == GoogleCredential::IdToken("id-token".into()))
            .times(2)
            .returning(|_| {
                Ok(GoogleProfile {
                    subject: "google-sub".into(),
                    email: "leitor@gmail.com".into(),
                    name: Some("Leitor".into()),
                })
            });
        let (service, _) = service(google).await;

        let request = || GoogleLoginRequest {
            credential: Some("id-token".into()),
            user_info: None,
        };
        let first = service.google_login(request()).await.unwrap();
        let second = service.google_login(request()).await.unwrap();
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(first.user.name, "Leitor");

        // the account has no usable password
        assert!(service
            .login(LoginRequest {
                email: "leitor@gmail.com".into(),
                password: "google-sub".into(),
            })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn google_access_token_is_accepted() {
        let mut google = MockGoogle::new();
        google
            .expect_verify()
            .withf(|c| *c == GoogleCredential::AccessToken("access".into()))
            .returning(|_| {
                Ok(GoogleProfile {
                    subject: "sub".into(),
                    email: "popup@gmail.com".into(),
                    name: None,
                })
            });
        let (service, _) = service(google).await;

        let response = service
            .google_login(GoogleLoginRequest {
                credential: None,
                user_info: Some(GoogleUserInfo {
                    access_token: Some("access".into()),
                }),
            })
            .await
            .unwrap();
        assert_eq!(response.user.name, "popup@gmail.com");
    }

    #[tokio::test]
    async fn google_login_without_credential_is_rejected() {
        let (service, _) = service(MockGoogle::new()).await;
        assert_matches!(
            service.google_login(GoogleLoginRequest::default()).await,
            Err(ServiceError::ValidationError(_))
        );
    }
}
