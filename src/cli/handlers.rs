//! CLI command handlers.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{
    CallbackHandler, CallbackOutcome, CallbackReconciler, FileCredentialStore, PkceCodeExchange,
    PkceFlow, PkceSession,
};
use crate::config::{CallbackMode, ClientConfig};
use crate::error::AuthError;
use crate::gateway::{Gateway, Navigator};
use crate::session::Session;

type CliResult = Result<(), Box<dyn std::error::Error>>;

const PKCE_SESSION_FILE: &str = "pkce_session.json";

/// Terminal stand-in for a browser: navigation is printed for the user.
#[derive(Debug, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, target: &str) {
        println!("🔗 {target}");
    }
}

/// Everything a command needs, wired from the environment.
struct Context {
    config: ClientConfig,
    session: Arc<Session>,
    navigator: Arc<dyn Navigator>,
}

impl Context {
    fn from_env() -> Result<Self, AuthError> {
        let config = ClientConfig::from_env()?;
        let store = Arc::new(FileCredentialStore::new(&config.credentials_dir));
        let navigator: Arc<dyn Navigator> = Arc::new(TerminalNavigator);
        let gateway = Arc::new(Gateway::new(config.clone(), store, navigator.clone())?);
        Ok(Self {
            config,
            session: Arc::new(Session::new(gateway)),
            navigator,
        })
    }

    fn pkce_session_path(&self) -> PathBuf {
        self.config.credentials_dir.join(PKCE_SESSION_FILE)
    }

    fn pkce_flow(&self) -> Result<PkceFlow, AuthError> {
        self.config
            .pkce
            .clone()
            .map(PkceFlow::new)
            .ok_or_else(|| AuthError::Configuration("PKCE is not configured".to_string()))
    }
}

/// Handle `authkeep login`.
pub async fn handle_login(email: &str, password: Option<String>) -> CliResult {
    let ctx = Context::from_env()?;
    ctx.session.bootstrap().await;
    let password = password_or_prompt(password)?;
    ctx.session.login(email, &password).await?;
    print_signed_in(&ctx.session);
    Ok(())
}

/// Handle `authkeep signup`.
pub async fn handle_signup(email: &str, full_name: &str, password: Option<String>) -> CliResult {
    let ctx = Context::from_env()?;
    ctx.session.bootstrap().await;
    let password = password_or_prompt(password)?;
    ctx.session.signup(email, &password, full_name).await?;
    print_signed_in(&ctx.session);
    Ok(())
}

/// Handle `authkeep logout`.
pub async fn handle_logout() -> CliResult {
    let ctx = Context::from_env()?;
    ctx.session.bootstrap().await;
    ctx.session.logout().await;
    println!("✅ Signed out");
    Ok(())
}

/// Handle `authkeep whoami`.
pub async fn handle_whoami() -> CliResult {
    let ctx = Context::from_env()?;
    let state = ctx.session.bootstrap().await;

    println!("🔐 Session Status\n");
    match (state.user(), state.profile()) {
        (Some(user), profile) => {
            println!("  User: {} ({})", user.email, user.id);
            if let Some(profile) = profile {
                if let Some(name) = &profile.full_name {
                    println!("  Name: {name}");
                }
                println!("  Tier: {}", profile.tier);
                println!("  Provider: {}", profile.auth_provider);
                if profile.is_admin {
                    println!("  Admin: yes");
                }
                if let Some(ratio) = profile.budget_used_ratio() {
                    println!(
                        "  Budget: ${:.2} of ${:.2} ({:.0}%)",
                        profile.current_month_spent_usd,
                        profile.monthly_budget_usd,
                        ratio * 100.0
                    );
                }
            }
        }
        (None, _) => println!("  ❌ Not signed in"),
    }
    Ok(())
}

/// Handle `authkeep google-url`.
///
/// In PKCE mode the generated secrets are kept on disk for the matching
/// `authkeep callback`.
pub async fn handle_google_url() -> CliResult {
    let ctx = Context::from_env()?;
    match ctx.config.callback_mode {
        CallbackMode::Server => {
            ctx.session.login_with_google();
        }
        CallbackMode::Pkce => {
            let pkce = ctx.pkce_flow()?.start()?;
            pkce.save(&ctx.pkce_session_path())?;
            ctx.navigator.navigate(&pkce.authorize_url);
        }
    }
    Ok(())
}

/// Handle `authkeep callback <url>`.
pub async fn handle_callback(url: &str) -> CliResult {
    let ctx = Context::from_env()?;
    let api = ctx.session.api().clone();

    let reconciler = match ctx.config.callback_mode {
        CallbackMode::Server => CallbackReconciler::server_side(api),
        CallbackMode::Pkce => {
            let pkce = PkceSession::load(&ctx.pkce_session_path())?.ok_or_else(|| {
                AuthError::InvalidState(
                    "no pending PKCE sign-in; run `authkeep google-url` first".to_string(),
                )
            })?;
            let exchange = PkceCodeExchange::new(ctx.pkce_flow()?, pkce);
            CallbackReconciler::new(api, Arc::new(exchange))
        }
    };

    let handler = CallbackHandler::new(
        reconciler,
        ctx.session.clone(),
        ctx.navigator.clone(),
        ctx.config.clone(),
    );
    let report = handler.handle(url).await;

    if ctx.config.callback_mode == CallbackMode::Pkce {
        let _ = std::fs::remove_file(ctx.pkce_session_path());
    }

    match report.outcome {
        CallbackOutcome::Tokens(_) => {
            if ctx.session.bootstrap().await.is_authenticated() {
                print_signed_in(&ctx.session);
            } else {
                eprintln!("⚠️  Credentials stored but the profile could not be loaded");
            }
            Ok(())
        }
        CallbackOutcome::Error(failure) => {
            eprintln!("❌ {failure}");
            Err(AuthError::from(failure).into())
        }
        CallbackOutcome::Code(_) => Err(AuthError::Exchange(
            "authorization code was not exchanged".to_string(),
        )
        .into()),
    }
}

fn print_signed_in(session: &Session) {
    if let Some(user) = session.state().user() {
        println!("✅ Signed in as {}", user.email);
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String, std::io::Error> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
