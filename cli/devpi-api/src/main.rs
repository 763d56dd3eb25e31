//! devpi-api: command-line client for devpi package index servers.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "devpi-api",
    version,
    about = "Manage users, indexes, packages and tokens on a devpi server"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Connection and output options accepted by every command.
#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Server URL (overrides DEVPI_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,
    /// Username for password authentication
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,
    /// Password for password authentication
    #[arg(long, global = true)]
    pub password: Option<String>,
    /// API token (takes precedence over user/password)
    #[arg(long, global = true)]
    pub token: Option<String>,
    /// PEM bundle of additional trusted CA certificates
    #[arg(long, global = true)]
    pub ca_bundle: Option<PathBuf>,
    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,
    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
    /// Config file (default: devpi-api.toml in this or a parent directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Dotenv file (default: .env in the working directory, if present)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Server status and connection diagnostics
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage indexes (addressed as USER/NAME)
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Inspect, upload and delete packages
    #[command(alias = "package")]
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Release tooling for this repository
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },
}

#[derive(Subcommand)]
enum ServerAction {
    /// Show client version, server URL, auth mode and reachability
    Info,
}

#[derive(Subcommand)]
enum UserAction {
    /// List all users
    List,
    /// Show one user and their indexes
    Get { username: String },
    /// Create a user
    Create {
        username: String,
        new_password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete a user
    Delete { username: String },
    /// Change a user's password and/or email
    Modify {
        username: String,
        #[arg(long)]
        new_password: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Set a new password
    Passwd {
        username: String,
        new_password: String,
    },
    /// Check whether a user exists
    Exists { username: String },
}

#[derive(Subcommand)]
enum IndexAction {
    /// List a user's indexes
    List { username: String },
    /// Show an index configuration
    Get {
        index: String,
        /// Include the project list
        #[arg(long)]
        projects: bool,
    },
    /// Create an index
    Create {
        index: String,
        /// Index type (stage or mirror)
        #[arg(long = "type", default_value = "stage")]
        index_type: String,
        /// Base indexes, comma separated
        #[arg(long, value_delimiter = ',')]
        bases: Option<Vec<String>>,
        /// Forbid overwriting and deleting releases
        #[arg(long)]
        non_volatile: bool,
        /// Users allowed to upload, comma separated
        #[arg(long, value_delimiter = ',')]
        acl_upload: Option<Vec<String>>,
        /// Upstream simple index for mirrors
        #[arg(long)]
        mirror_url: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Change index settings
    Modify {
        index: String,
        #[arg(long, value_delimiter = ',')]
        bases: Option<Vec<String>>,
        #[arg(long)]
        volatile: Option<bool>,
        #[arg(long, value_delimiter = ',')]
        acl_upload: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        acl_toxresult_upload: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        mirror_whitelist: Option<Vec<String>>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete an index
    Delete { index: String },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List projects in an index
    List { index: String },
    /// Show versions and files of a project
    Get { index: String, package: String },
    /// Upload wheels, sdists or eggs
    Upload {
        index: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete one release
    Delete {
        index: String,
        package: String,
        version: String,
    },
    /// Check whether a project (or version) exists
    Exists {
        index: String,
        package: String,
        #[arg(long)]
        version: Option<String>,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Create a token and print its secret
    Create {
        username: String,
        /// Permissions, comma separated (e.g. upload,pkg_read)
        #[arg(long, value_delimiter = ',')]
        allowed: Vec<String>,
        /// Lifetime in seconds
        #[arg(long)]
        expires_in: Option<u64>,
        /// Restrict to these indexes, comma separated
        #[arg(long, value_delimiter = ',')]
        indexes: Vec<String>,
        /// Restrict to these projects, comma separated
        #[arg(long, value_delimiter = ',')]
        projects: Vec<String>,
    },
    /// List a user's tokens
    List { username: String },
    /// Revoke a token by id
    Delete { username: String, token_id: String },
    /// Decode a token locally
    Inspect {
        #[arg(value_name = "TOKEN")]
        encoded: String,
    },
}

#[derive(Subcommand)]
enum ReleaseAction {
    /// Check that a tag, the workspace version and the changelog agree
    Check {
        /// Tag being released, e.g. v0.2.0
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, default_value = "Cargo.toml")]
        manifest: PathBuf,
        #[arg(long, default_value = "CHANGELOG.md")]
        changelog: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose, cli.global.quiet);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    let json = global.json;

    match cli.command {
        Commands::Server { action } => match action {
            ServerAction::Info => commands::server::info(&global),
        },

        Commands::User { action } => {
            let client = config::connect(&global)?;
            match action {
                UserAction::List => commands::user::list(&client, json),
                UserAction::Get { username } => commands::user::get(&client, &username, json),
                UserAction::Create {
                    username,
                    new_password,
                    email,
                } => commands::user::create(&client, &username, &new_password, email.as_deref(), json),
                UserAction::Delete { username } => commands::user::delete(&client, &username, json),
                UserAction::Modify {
                    username,
                    new_password,
                    email,
                } => commands::user::modify(&client, &username, new_password, email, json),
                UserAction::Passwd {
                    username,
                    new_password,
                } => commands::user::passwd(&client, &username, &new_password, json),
                UserAction::Exists { username } => commands::user::exists(&client, &username, json),
            }
        }

        Commands::Index { action } => {
            let client = config::connect(&global)?;
            match action {
                IndexAction::List { username } => commands::index::list(&client, &username, json),
                IndexAction::Get { index, projects } => {
                    commands::index::get(&client, &index, projects, json)
                }
                IndexAction::Create {
                    index,
                    index_type,
                    bases,
                    non_volatile,
                    acl_upload,
                    mirror_url,
                    title,
                } => {
                    let spec = devpi_client::IndexSpec {
                        index_type,
                        volatile: !non_volatile,
                        bases,
                        acl_upload,
                        mirror_url,
                        title,
                        ..Default::default()
                    };
                    commands::index::create(&client, &index, &spec, json)
                }
                IndexAction::Modify {
                    index,
                    bases,
                    volatile,
                    acl_upload,
                    acl_toxresult_upload,
                    mirror_whitelist,
                    title,
                } => {
                    let update = devpi_client::IndexUpdate {
                        bases,
                        volatile,
                        acl_upload,
                        acl_toxresult_upload,
                        mirror_whitelist,
                        title,
                        ..Default::default()
                    };
                    commands::index::modify(&client, &index, &update, json)
                }
                IndexAction::Delete { index } => commands::index::delete(&client, &index, json),
            }
        }

        Commands::Project { action } => {
            let client = config::connect(&global)?;
            match action {
                ProjectAction::List { index } => commands::project::list(&client, &index, json),
                ProjectAction::Get { index, package } => {
                    commands::project::get(&client, &index, &package, json)
                }
                ProjectAction::Upload { index, files } => {
                    commands::project::upload(&client, &index, &files, json)
                }
                ProjectAction::Delete {
                    index,
                    package,
                    version,
                } => commands::project::delete(&client, &index, &package, &version, json),
                ProjectAction::Exists {
                    index,
                    package,
                    version,
                } => commands::project::exists(&client, &index, &package, version.as_deref(), json),
            }
        }

        Commands::Token { action } => match action {
            TokenAction::Inspect { encoded } => commands::token::inspect(&encoded, json),
            TokenAction::Create {
                username,
                allowed,
                expires_in,
                indexes,
                projects,
            } => {
                let client = config::connect(&global)?;
                let request = devpi_client::TokenRequest {
                    allowed,
                    expires_in_seconds: expires_in,
                    indexes,
                    projects,
                };
                commands::token::create(&client, &username, &request, json)
            }
            TokenAction::List { username } => {
                let client = config::connect(&global)?;
                commands::token::list(&client, &username, json)
            }
            TokenAction::Delete { username, token_id } => {
                let client = config::connect(&global)?;
                commands::token::delete(&client, &username, &token_id, json)
            }
        },

        Commands::Release { action } => match action {
            ReleaseAction::Check {
                tag,
                manifest,
                changelog,
            } => commands::release::check(tag.as_deref(), &manifest, &changelog, json),
        },
    }
}
