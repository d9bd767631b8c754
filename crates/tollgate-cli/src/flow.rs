//! Login / signup / home screen flow.
//!
//! [`SessionFlow`] owns the current [`Page`] and turns store outcomes into
//! [`Feedback`]: an outcome, a message for the user, and the page to show
//! next. It is the only place where store errors become user-facing text.

use tollgate_store::{AccountStore, ErrorKind, StoreError, ValidationError};
use tracing::{info, warn};

pub const WELCOME: &str = "Welcome to Home Page";

/// A screen of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Login,
    Signup,
    Home { username: String },
}

impl Page {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Signup => "Sign up",
            Self::Home { .. } => "Home",
        }
    }
}

/// Whether an action succeeded, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
        }
    }
}

/// What the user sees after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub outcome: Outcome,
    pub message: String,
    pub page: Page,
}

impl Feedback {
    fn success(message: &str, page: Page) -> Self {
        Self {
            outcome: Outcome::Success,
            message: message.to_string(),
            page,
        }
    }

    fn error(message: &str, page: Page) -> Self {
        Self {
            outcome: Outcome::Error,
            message: message.to_string(),
            page,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Drives page transitions on top of a shared [`AccountStore`].
pub struct SessionFlow {
    store: AccountStore,
    page: Page,
}

impl SessionFlow {
    /// Start on the login page.
    pub fn new(store: AccountStore) -> Self {
        Self {
            store,
            page: Page::Login,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Register an account. On success the user is sent to the login page.
    pub async fn sign_up(&mut self, form: &SignupForm) -> Feedback {
        let result = self
            .store
            .register(&form.username, &form.email, &form.password)
            .await;

        let feedback = match result {
            Ok(id) => {
                info!(account_id = id, "signup completed");
                Feedback::success("Account created successfully!", Page::Login)
            }
            Err(err) => Feedback::error(signup_message(&err), Page::Signup),
        };
        self.page = feedback.page.clone();
        feedback
    }

    /// Check credentials. On success the user is sent to the home page.
    pub async fn log_in(&mut self, form: &LoginForm) -> Feedback {
        let feedback = match self.store.authenticate(&form.username, &form.password).await {
            Ok(account) => {
                info!(account_id = account.id, "login succeeded");
                Feedback::success(
                    "Login successful!",
                    Page::Home {
                        username: account.username,
                    },
                )
            }
            Err(err) => Feedback::error(login_message(&err), Page::Login),
        };
        self.page = feedback.page.clone();
        feedback
    }

    pub fn go_to_signup(&mut self) {
        self.page = Page::Signup;
    }

    pub fn go_to_login(&mut self) {
        self.page = Page::Login;
    }

    /// Leave the home page.
    pub fn log_out(&mut self) {
        self.page = Page::Login;
    }
}

fn signup_message(err: &StoreError) -> &'static str {
    match err {
        StoreError::InvalidInput(ValidationError::Empty(_)) => "All fields are required",
        StoreError::InvalidInput(ValidationError::MalformedEmail) => "Invalid email format",
        StoreError::DuplicateUsername { .. } => "User Name is already taken",
        other => {
            warn!(error = %other, "signup failed");
            "An unexpected error occurred"
        }
    }
}

fn login_message(err: &StoreError) -> &'static str {
    match err.kind() {
        ErrorKind::NotFound => "Invalid credentials",
        _ => {
            warn!(error = %err, "login failed");
            "An unexpected error occurred"
        }
    }
}
