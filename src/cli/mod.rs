//! CLI entry point for Authkeep.

pub mod handlers;

use clap::{Parser, Subcommand};

/// Authkeep session CLI
#[derive(Parser, Debug)]
#[command(name = "authkeep", version, about = "Authkeep session and token lifecycle CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with email and password
    Login(LoginArgs),
    /// Create an account with email and password
    Signup(SignupArgs),
    /// Sign out and clear stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Complete a provider redirect
    Callback(CallbackArgs),
    /// Print the URL that starts Google sign-in
    GoogleUrl,
}

/// Arguments for `authkeep login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(short, long)]
    pub email: String,

    /// Account password (prompted when omitted)
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Arguments for `authkeep signup`.
#[derive(Parser, Debug)]
pub struct SignupArgs {
    /// Account email
    #[arg(short, long)]
    pub email: String,

    /// Display name
    #[arg(short = 'n', long)]
    pub full_name: String,

    /// Account password (prompted when omitted)
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Arguments for `authkeep callback`.
#[derive(Parser, Debug)]
pub struct CallbackArgs {
    /// Full redirect URL, including query and fragment
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_login_with_password() {
        let cli =
            Cli::try_parse_from(["authkeep", "login", "-e", "ada@example.com", "-p", "pw"]).unwrap();
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.email, "ada@example.com");
                assert_eq!(args.password.as_deref(), Some("pw"));
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_login_without_password() {
        let cli = Cli::try_parse_from(["authkeep", "login", "--email", "ada@example.com"]).unwrap();
        match cli.command {
            Commands::Login(args) => assert!(args.password.is_none()),
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_signup() {
        let cli = Cli::try_parse_from([
            "authkeep",
            "signup",
            "--email",
            "ada@example.com",
            "--full-name",
            "Ada Lovelace",
        ])
        .unwrap();
        match cli.command {
            Commands::Signup(args) => {
                assert_eq!(args.email, "ada@example.com");
                assert_eq!(args.full_name, "Ada Lovelace");
            }
            other => panic!("expected Signup, got {other:?}"),
        }
    }

    #[test]
    fn parse_callback_url() {
        let cli = Cli::try_parse_from([
            "authkeep",
            "callback",
            "http://localhost:3000/auth/callback?code=abc123",
        ])
        .unwrap();
        match cli.command {
            Commands::Callback(args) => {
                assert_eq!(args.url, "http://localhost:3000/auth/callback?code=abc123")
            }
            other => panic!("expected Callback, got {other:?}"),
        }
    }

    #[test]
    fn parse_unit_commands() {
        for (name, check) in [
            ("logout", (|c: &Commands| matches!(c, Commands::Logout)) as fn(&Commands) -> bool),
            ("whoami", |c| matches!(c, Commands::Whoami)),
            ("google-url", |c| matches!(c, Commands::GoogleUrl)),
        ] {
            let cli = Cli::try_parse_from(["authkeep", name]).unwrap();
            assert!(check(&cli.command), "{name} parsed as {:?}", cli.command);
        }
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["authkeep"]).is_err());
    }

    #[test]
    fn parse_login_missing_email_is_error() {
        assert!(Cli::try_parse_from(["authkeep", "login"]).is_err());
    }
}
