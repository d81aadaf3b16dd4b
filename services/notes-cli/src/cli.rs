//! Command-line arguments

use std::path::PathBuf;

use session_auth::Role;

#[derive(Debug, clap::Parser)]
#[command(name = "notes", version, about = "Notes API client with automatic token refresh")]
pub struct Cli {
    /// Config file (defaults to CONFIG_PATH, then ./notes.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Log in and store the session tokens.
    Login(LoginArgs),
    /// Forget the stored session.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Create an account and log it in.
    Register(RegisterArgs),
    /// Manage notes.
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
    /// List job posts (public posts for drivers, own posts otherwise).
    Jobs {
        /// Role to list for; asks the server when omitted.
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
    },
}

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Username or email.
    pub identifier: String,
    #[arg(long, env = "NOTES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct RegisterArgs {
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long, value_enum, default_value = "client")]
    pub role: RoleArg,
    #[arg(long, env = "NOTES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Driver only.
    #[arg(long)]
    pub license_number: Option<String>,
    /// Driver only.
    #[arg(long)]
    pub frequent_location: Option<String>,
    /// Driver only: scan of a personal ID document.
    #[arg(long)]
    pub personal_id: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum NotesCommand {
    List,
    Create {
        content: String,
    },
    Update {
        id: i64,
        content: String,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RoleArg {
    Driver,
    Client,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Driver => Role::Driver,
            RoleArg::Client => Role::Client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_login_with_password_flag() {
        let cli = Cli::try_parse_from(["notes", "login", "ana", "--password", "hunter2"]).unwrap();
        match cli.command {
            Command::Login(args) => {
                assert_eq!(args.identifier, "ana");
                assert_eq!(args.password.as_deref(), Some("hunter2"));
            }
            other => panic!("expected login, got {other:?}"),
        }
    }

    #[test]
    fn parses_notes_update() {
        let cli = Cli::try_parse_from(["notes", "notes", "update", "5", "new text"]).unwrap();
        match cli.command {
            Command::Notes {
                command: NotesCommand::Update { id, content },
            } => {
                assert_eq!(id, 5);
                assert_eq!(content, "new text");
            }
            other => panic!("expected notes update, got {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["notes", "whoami", "--config", "/etc/notes.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/notes.toml")));
    }

    #[test]
    fn register_defaults_to_client_role() {
        let cli = Cli::try_parse_from([
            "notes", "register", "ana", "--email", "ana@example.com", "--phone", "+355690000000",
        ])
        .unwrap();
        match cli.command {
            Command::Register(args) => {
                assert_eq!(args.role, RoleArg::Client);
                assert!(args.personal_id.is_none());
            }
            other => panic!("expected register, got {other:?}"),
        }
    }

    #[test]
    fn jobs_role_must_be_known() {
        assert!(Cli::try_parse_from(["notes", "jobs", "--role", "pilot"]).is_err());
        let cli = Cli::try_parse_from(["notes", "jobs", "--role", "driver"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Jobs {
                role: Some(RoleArg::Driver)
            }
        ));
    }

    #[test]
    fn role_arg_converts_to_role() {
        assert_eq!(Role::from(RoleArg::Driver), Role::Driver);
        assert_eq!(Role::from(RoleArg::Client).as_str(), "client");
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
