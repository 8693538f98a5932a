//! CLI entry and dispatch.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::BoolishValueParser;
use handy_core::client::RequestClient;
use handy_core::config::Config;
use handy_core::session::{FileSessionStore, SessionStore};

mod commands;

#[derive(Parser)]
#[command(name = "handy")]
#[command(version)]
#[command(about = "Book local services from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Skip the pause before following a redirect
    #[arg(
        long,
        global = true,
        env = "HANDY_NO_WAIT",
        value_parser = BoolishValueParser::new()
    )]
    no_wait: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Inspect or edit the stored session
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Create an account
    Signup {
        #[command(subcommand)]
        command: SignupCommands,
    },

    /// Sign in as a provider
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign out (clear the stored session)
    Logout,

    /// Complete the provider profile (second signup step)
    BusinessDetails(commands::business::BusinessArgs),

    /// Request a booking with a provider
    Book(commands::booking::BookArgs),

    /// List service categories
    Categories {
        /// Only show categories whose name or slug contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Browse providers
    Providers {
        #[command(subcommand)]
        command: ProviderCommands,
    },

    /// Manage your bookings
    Bookings {
        #[command(subcommand)]
        command: BookingCommands,
    },

    /// Show the provider dashboard
    Dashboard,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the marketplace API base URL
    SetApiUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

#[derive(clap::Subcommand)]
enum SessionCommands {
    /// Show stored identifiers (tokens are masked)
    Show,
    /// Store a value in a slot (accessToken, userId, providerId, cookie)
    Set {
        #[arg(value_name = "SLOT")]
        slot: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    /// Remove one slot, or everything when no slot is given
    Clear {
        #[arg(value_name = "SLOT")]
        slot: Option<String>,
    },
}

#[derive(clap::Subcommand)]
enum SignupCommands {
    /// Register as a customer
    Customer(commands::auth::SignupArgs),
    /// Register as a service provider
    Provider(commands::auth::SignupArgs),
}

#[derive(clap::Subcommand)]
enum ProviderCommands {
    /// List providers, optionally in one category
    List {
        /// Category slug, e.g. home-repair
        #[arg(long, value_name = "SLUG")]
        category: Option<String>,
    },
    /// Show one provider
    Show {
        #[arg(value_name = "PROVIDER_ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum BookingCommands {
    /// List your bookings
    List,
    /// Change a booking's status (pending, accepted, rejected, completed)
    Status {
        #[arg(value_name = "BOOKING_ID")]
        id: String,
        #[arg(value_name = "STATUS")]
        status: String,
    },
}

/// An error whose message was already printed.
#[derive(Debug)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("error already reported")
    }
}

impl std::error::Error for Reported {}

/// Shared state for commands that talk to the API.
pub struct App {
    pub config: Config,
    pub client: RequestClient,
    pub no_wait: bool,
}

impl App {
    fn load(no_wait: bool) -> Result<Self> {
        let config = Config::load().context("load config")?;
        let session: Arc<dyn SessionStore> = Arc::new(FileSessionStore::open_default());
        let client = RequestClient::from_config(&config, session)?;
        Ok(Self {
            config,
            client,
            no_wait,
        })
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, no_wait } = cli;

    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetApiUrl { url } => commands::config::set_api_url(&url),
        },

        Commands::Session { command } => {
            let session = FileSessionStore::open_default();
            match command {
                SessionCommands::Show => commands::session::show(&session),
                SessionCommands::Set { slot, value } => {
                    commands::session::set(&session, &slot, &value)
                }
                SessionCommands::Clear { slot } => {
                    commands::session::clear(&session, slot.as_deref())
                }
            }
        }

        Commands::Signup { command } => {
            let app = App::load(no_wait)?;
            match command {
                SignupCommands::Customer(args) => commands::auth::signup_customer(&app, args).await,
                SignupCommands::Provider(args) => commands::auth::signup_provider(&app, args).await,
            }
        }

        Commands::Login { email, password } => {
            let app = App::load(no_wait)?;
            commands::auth::login(&app, email, password).await
        }

        Commands::Logout => commands::auth::logout(&FileSessionStore::open_default()),

        Commands::BusinessDetails(args) => {
            let app = App::load(no_wait)?;
            commands::business::run(&app, args).await
        }

        Commands::Book(args) => {
            let app = App::load(no_wait)?;
            commands::booking::run(&app, args).await
        }

        Commands::Categories { search } => {
            commands::providers::categories(search.as_deref());
            Ok(())
        }

        Commands::Providers { command } => {
            let app = App::load(no_wait)?;
            match command {
                ProviderCommands::List { category } => {
                    commands::providers::list(&app, category.as_deref()).await
                }
                ProviderCommands::Show { id } => commands::providers::show(&app, &id).await,
            }
        }

        Commands::Bookings { command } => {
            let app = App::load(no_wait)?;
            match command {
                BookingCommands::List => commands::bookings::list(&app).await,
                BookingCommands::Status { id, status } => {
                    commands::bookings::set_status(&app, &id, &status).await
                }
            }
        }

        Commands::Dashboard => {
            let app = App::load(no_wait)?;
            commands::dashboard::run(&app).await
        }
    }
}
