use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::{
    dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest, RegisterResponse, SocialRegisterRequest},
    jwt::TokenIssuer,
    password::{generate_placeholder_password, hash_password, verify_dummy, verify_password},
};
use crate::{
    error::AppError,
    gamification::{catalog::WELCOME_KEY, services::Awarder},
    mail::{welcome_email, MailQueue},
    state::AppState,
    store::StoreError,
    users::{
        repo::UserStore,
        repo_types::{NewUser, User},
    },
};

pub const PROVIDER_LOCAL: &str = "local";
pub const PROVIDER_GOOGLE: &str = "google";

const MSG_REGISTERED: &str = "User registered successfully";
const MSG_EXISTING: &str = "User already exists, logged in successfully";
const MSG_LOGGED_IN: &str = "Login successful";

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 100;
const MIN_SOCIAL_NAME_LEN: usize = 2;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Surrounding whitespace is dropped; case is kept and compared as stored.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

pub(crate) fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() {
        return Err(AppError::validation("email", "Email is required"));
    }
    if !is_valid_email(email) {
        return Err(AppError::validation("email", "Invalid email format"));
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str, min_len: usize) -> Result<(), AppError> {
    let len = name.chars().count();
    if len == 0 {
        return Err(AppError::validation("name", "Name is required"));
    }
    if len < min_len {
        return Err(AppError::validation(
            "name",
            format!("Name must be at least {min_len} characters"),
        ));
    }
    if len > MAX_NAME_LEN {
        return Err(AppError::validation(
            "name",
            format!("Name must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(field: &'static str, password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::validation(field, "Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            field,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

enum Created {
    New(User),
    /// Someone else registered the email between our lookup and insert.
    LostRace(User),
}

/// Registration and login orchestration.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    awarder: Awarder,
    tokens: TokenIssuer,
    mail: MailQueue,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            Awarder::from_ref(state),
            TokenIssuer::from_ref(state),
            state.mail.clone(),
        )
    }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        awarder: Awarder,
        tokens: TokenIssuer,
        mail: MailQueue,
    ) -> Self {
        Self {
            users,
            awarder,
            tokens,
            mail,
        }
    }

    /// Sign-in with a provider profile. Creates the account on first use, logs in afterwards.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register_social(&self, req: SocialRegisterRequest) -> Result<RegisterResponse, AppError> {
        let email = normalize_email(&req.email);
        let name = req.name.trim().to_string();
        validate_email(&email)?;
        validate_name(&name, MIN_SOCIAL_NAME_LEN)?;

        if let Some(existing) = self.lookup(&email).await? {
            return self.existing_login(existing);
        }

        let placeholder = generate_placeholder_password();
        let password_hash = hash_password(&placeholder)
            .map_err(|e| AppError::internal("failed to create user account", e))?;

        let new_user = NewUser {
            name,
            email,
            password_hash,
            avatar_url: req.avatar_url.filter(|u| !u.trim().is_empty()),
            auth_provider: Some(PROVIDER_GOOGLE.to_string()),
        };
        match self.create(new_user).await? {
            Created::New(user) => self.finish_new(user).await,
            Created::LostRace(user) => self.existing_login(user),
        }
    }

    /// Email + password registration. An existing account is logged into when the
    /// password matches.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, AppError> {
        let email = normalize_email(&req.email);
        let name = req.name.trim().to_string();
        validate_email(&email)?;
        validate_name(&name, 1)?;
        validate_password("password", &req.password)?;

        if let Some(existing) = self.lookup(&email).await? {
            return self.existing_login_with_password(existing, &req.password);
        }

        let password_hash = hash_password(&req.password)
            .map_err(|e| AppError::internal("failed to create user account", e))?;

        let new_user = NewUser {
            name,
            email,
            password_hash,
            avatar_url: None,
            auth_provider: Some(PROVIDER_LOCAL.to_string()),
        };
        match self.create(new_user).await? {
            Created::New(user) => {
                let email = welcome_email(&user.email, &user.name);
                let res = self.finish_new(user).await?;
                self.mail.enqueue(email);
                Ok(res)
            }
            Created::LostRace(user) => self.existing_login_with_password(user, &req.password),
        }
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&req.email);
        if email.is_empty() {
            return Err(AppError::validation("email", "Email is required"));
        }
        if req.password.is_empty() {
            return Err(AppError::validation("password", "Password is required"));
        }

        let user = match self.users.find_by_email(&email).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                verify_dummy(&req.password);
                warn!(email = %email, "login unknown email");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => {
                verify_dummy(&req.password);
                warn!(error = %e, "login lookup failed");
                return Err(AppError::InvalidCredentials);
            }
        };

        match verify_password(&req.password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id = %user.id, "login invalid password");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "stored password hash unusable");
                return Err(AppError::InvalidCredentials);
            }
        }

        let token = self.issue(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(LoginResponse {
            message: MSG_LOGGED_IN.to_string(),
            user: PublicUser::from(&user),
            token,
        })
    }

    async fn lookup(&self, email: &str) -> Result<Option<User>, AppError> {
        self.users
            .find_by_email(email)
            .await
            .map_err(|e| AppError::internal("failed to check user existence", e))
    }

    async fn create(&self, new_user: NewUser) -> Result<Created, AppError> {
        let email = new_user.email.clone();
        match self.users.create(new_user).await {
            Ok(user) => Ok(Created::New(user)),
            Err(StoreError::Conflict) => {
                warn!(email = %email, "concurrent registration; using the existing account");
                match self.lookup(&email).await? {
                    Some(user) => Ok(Created::LostRace(user)),
                    None => Err(AppError::internal(
                        "failed to create user account",
                        anyhow::anyhow!("email conflict but no user found for {email}"),
                    )),
                }
            }
            Err(e) => Err(AppError::internal("failed to create user account", e)),
        }
    }

    async fn finish_new(&self, user: User) -> Result<RegisterResponse, AppError> {
        let achievement = match self.awarder.award(user.id, WELCOME_KEY).await {
            Ok(outcome) if outcome.is_new() => Some(outcome.achievement().clone()),
            Ok(_) => None,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "welcome achievement not awarded");
                None
            }
        };

        let token = self.issue(&user)?;
        info!(user_id = %user.id, email = %user.email, is_new_user = true, "user registered");
        Ok(RegisterResponse {
            message: MSG_REGISTERED.to_string(),
            user: PublicUser::from(&user),
            token,
            is_new_user: true,
            achievement,
        })
    }

    fn existing_login(&self, user: User) -> Result<RegisterResponse, AppError> {
        let token = self.issue(&user)?;
        info!(user_id = %user.id, is_new_user = false, "existing user signed in via registration");
        Ok(RegisterResponse {
            message: MSG_EXISTING.to_string(),
            user: PublicUser::from(&user),
            token,
            is_new_user: false,
            achievement: None,
        })
    }

    fn existing_login_with_password(&self, user: User, password: &str) -> Result<RegisterResponse, AppError> {
        match verify_password(password, &user.password_hash) {
            Ok(true) => self.existing_login(user),
            Ok(false) | Err(_) => {
                warn!(user_id = %user.id, "registration for existing email with wrong password");
                Err(AppError::InvalidCredentials)
            }
        }
    }

    fn issue(&self, user: &User) -> Result<String, AppError> {
        self.tokens
            .issue(user.id)
            .map_err(|e| AppError::internal("failed to generate authentication token", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::mail::{Email, LogMailer, Mailer, QueueOptions};
    use crate::testing::MemoryDb;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    #[derive(Default)]
    struct RecordingMailer {
        sent: std::sync::Mutex<Vec<Email>>,
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &Email) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    /// Service whose mail lands in the returned recorder. Drop the service and await
    /// the handle before reading it.
    fn service_with_mail() -> (AuthService, Arc<RecordingMailer>, JoinHandle<()>) {
        let db = Arc::new(MemoryDb::seeded());
        let mailer = Arc::new(RecordingMailer::default());
        let (mail, worker) = MailQueue::start(
            mailer.clone(),
            QueueOptions {
                capacity: 8,
                max_attempts: 1,
                base_backoff: Duration::from_millis(1),
            },
        );
        let svc = AuthService::new(db.clone(), Awarder::new(db), tokens(), mail);
        (svc, mailer, worker)
    }

    fn tokens() -> TokenIssuer {
        TokenIssuer::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_hours: 72,
        })
    }

    fn service() -> (Arc<MemoryDb>, AuthService) {
        let db = Arc::new(MemoryDb::seeded());
        let (mail, _worker) = MailQueue::start(
            Arc::new(LogMailer),
            QueueOptions {
                capacity: 8,
                max_attempts: 1,
                base_backoff: Duration::from_millis(1),
            },
        );
        let svc = AuthService::new(db.clone(), Awarder::new(db.clone()), tokens(), mail);
        (db, svc)
    }

    fn social(email: &str, name: &str) -> SocialRegisterRequest {
        SocialRegisterRequest {
            email: email.into(),
            name: name.into(),
            avatar_url: None,
        }
    }

    fn standard(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            name: "Budi".into(),
            password: password.into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("budi@test.com"));
        assert!(!is_valid_email("budi@test"));
        assert!(!is_valid_email("budi test@test.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn name_bounds() {
        assert!(validate_name("B", MIN_SOCIAL_NAME_LEN).is_err());
        assert!(validate_name("Bu", MIN_SOCIAL_NAME_LEN).is_ok());
        assert!(validate_name(&"x".repeat(101), 1).is_err());
        assert!(validate_name(&"x".repeat(100), 1).is_ok());
    }

    #[tokio::test]
    async fn social_new_user_gets_account_xp_and_welcome() {
        let (db, svc) = service();
        let res = svc.register_social(social("test@example.com", "Test User")).await.unwrap();

        assert!(res.is_new_user);
        assert_eq!(res.message, MSG_REGISTERED);
        assert!(!res.token.is_empty());
        assert_eq!(res.achievement.as_ref().map(|a| a.key.as_str()), Some(WELCOME_KEY));
        assert_eq!(db.user_count(), 1);
        assert_eq!(db.xp_count(), 1);
        assert_eq!(db.unlock_count(res.user.id), 1);
        assert_eq!(db.total_xp(res.user.id), Some(10));
    }

    #[tokio::test]
    async fn social_existing_user_logs_in_without_new_rows() {
        let (db, svc) = service();
        let first = svc.register_social(social("test@example.com", "Test User")).await.unwrap();
        let second = svc.register_social(social("  test@example.com ", "Test User")).await.unwrap();

        assert!(!second.is_new_user);
        assert!(second.message.contains("already exists"));
        assert!(second.achievement.is_none());
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(db.user_count(), 1);
        assert_eq!(db.xp_count(), 1);
        assert_eq!(db.total_xp(first.user.id), Some(10));
    }

    #[tokio::test]
    async fn emails_differing_only_in_case_are_separate_accounts() {
        let (db, svc) = service();
        let upper = svc.register_social(social("Alice@Example.com", "Alice")).await.unwrap();
        let lower = svc.register_social(social("alice@example.com", "Alice")).await.unwrap();

        assert_eq!(upper.user.email, "Alice@Example.com");
        assert_eq!(lower.user.email, "alice@example.com");
        assert!(upper.is_new_user);
        assert!(lower.is_new_user);
        assert_ne!(upper.user.id, lower.user.id);
        assert_eq!(db.user_count(), 2);
    }

    #[tokio::test]
    async fn social_rejects_missing_email_and_short_name() {
        let (db, svc) = service();
        let err = svc.register_social(social("", "Test User")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "email", .. }));
        let err = svc.register_social(social("a@b.com", "A")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "name", .. }));
        assert_eq!(db.user_count(), 0);
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_rows() {
        let (db, svc) = service();
        db.fail_user_insert();
        let err = svc.register_social(social("test@example.com", "Test User")).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to create user account");
        assert_eq!(db.user_count(), 0);
        assert_eq!(db.xp_count(), 0);
    }

    #[tokio::test]
    async fn lookup_failure_is_internal() {
        let (db, svc) = service();
        db.fail_lookups();
        let err = svc.register_social(social("test@example.com", "Test User")).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to check user existence");
    }

    #[tokio::test]
    async fn losing_a_registration_race_logs_into_the_winner() {
        let (db, svc) = service();
        db.race_next_create(NewUser {
            name: "Winner".into(),
            email: "test@example.com".into(),
            password_hash: hash_password("irrelevant").unwrap(),
            avatar_url: None,
            auth_provider: Some(PROVIDER_GOOGLE.into()),
        });
        let res = svc.register_social(social("test@example.com", "Test User")).await.unwrap();
        assert!(!res.is_new_user);
        assert_eq!(res.user.name, "Winner");
        assert_eq!(db.user_count(), 1);
        assert_eq!(db.xp_count(), 1);
    }

    #[tokio::test]
    async fn welcome_award_failure_does_not_fail_registration() {
        let (db, svc) = service();
        db.fail_unlocks();
        let res = svc.register_social(social("test@example.com", "Test User")).await.unwrap();
        assert!(res.is_new_user);
        assert!(res.achievement.is_none());
        assert_eq!(db.total_xp(res.user.id), Some(0));
    }

    #[tokio::test]
    async fn standard_register_then_login() {
        let (_db, svc) = service();
        let reg = svc.register(standard("budi@test.com", "hunter2hunter2")).await.unwrap();
        assert!(reg.is_new_user);

        let res = svc.login(login_req(" budi@test.com ", "hunter2hunter2")).await.unwrap();
        assert_eq!(res.user.id, reg.user.id);
        assert_eq!(res.message, MSG_LOGGED_IN);

        let err = svc.login(login_req("Budi@Test.com", "hunter2hunter2")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn standard_register_existing_email_checks_password() {
        let (db, svc) = service();
        svc.register(standard("budi@test.com", "hunter2hunter2")).await.unwrap();

        let again = svc.register(standard("budi@test.com", "hunter2hunter2")).await.unwrap();
        assert!(!again.is_new_user);

        let err = svc.register(standard("budi@test.com", "wrong-password")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(db.user_count(), 1);
    }

    #[tokio::test]
    async fn only_standard_registration_sends_a_welcome_email() {
        let (svc, mailer, worker) = service_with_mail();
        svc.register_social(social("social@test.com", "Social User")).await.unwrap();
        svc.register(standard("budi@test.com", "hunter2hunter2")).await.unwrap();
        svc.register(standard("budi@test.com", "hunter2hunter2")).await.unwrap();
        drop(svc);
        worker.await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_email, "budi@test.com");
        assert_eq!(sent[0].to_name, "Budi");
    }

    #[tokio::test]
    async fn standard_register_rejects_short_password() {
        let (_db, svc) = service();
        let err = svc.register(standard("budi@test.com", "short")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "password", .. }));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (_db, svc) = service();
        svc.register(standard("budi@test.com", "hunter2hunter2")).await.unwrap();

        let wrong = svc.login(login_req("budi@test.com", "nope-nope")).await.unwrap_err();
        let unknown = svc.login(login_req("ghost@test.com", "nope-nope")).await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.status(), unknown.status());
    }

    #[tokio::test]
    async fn login_lookup_failure_is_a_credential_error() {
        let (db, svc) = service();
        db.fail_lookups();
        let err = svc.login(login_req("budi@test.com", "hunter2hunter2")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_with_malformed_stored_hash_is_a_credential_error() {
        let (db, svc) = service();
        db.insert(NewUser {
            name: "Budi".into(),
            email: "budi@test.com".into(),
            password_hash: "not-a-phc-string".into(),
            avatar_url: None,
            auth_provider: None,
        });
        let err = svc.login(login_req("budi@test.com", "hunter2hunter2")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let (_db, svc) = service();
        let err = svc.login(login_req("", "x")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "email", .. }));
        let err = svc.login(login_req("a@b.com", "")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "password", .. }));
    }
}
