//! MangaVerse CLI - terminal front end for the storefront.
//!
//! # Usage
//!
//! ```bash
//! # Log in and browse
//! mv-cli login -e reader@example.com
//! mv-cli products list
//! mv-cli products add-to-cart 65f1c0ffee
//!
//! # Manage the cart
//! mv-cli cart show --filter "one piece"
//! mv-cli cart inc 65f1c0ffee
//! mv-cli cart set 65f1c0ffee 3
//! mv-cli checkout --card-number 4242424242424242 --exp-month 12 --exp-year 2030 --cvc 123
//!
//! # Administration
//! mv-cli admin products create -n "Berserk vol. 1" -p 39.90 -d "Deluxe edition" -u https://img/berserk.jpg
//! mv-cli admin metrics --watch
//! ```
//!
//! # Environment Variables
//!
//! - `MANGAVERSE_API_URL` - Base URL of the shop API (required)
//! - `MANGAVERSE_TOKEN_PATH` - Where the session token is kept
//! - `STRIPE_PUBLISHABLE_KEY` - Enables `checkout`
//! - `SENTRY_DSN` - Enables error reporting

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mangaverse_storefront::{AppState, StorefrontConfig};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::CliError;

#[derive(Parser)]
#[command(name = "mv-cli")]
#[command(author, version, about = "MangaVerse storefront from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session token
    Logout,
    /// Show who the stored token belongs to
    Whoami,
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Pay for the cart by card
    Checkout {
        #[arg(long)]
        card_number: String,

        #[arg(long)]
        exp_month: u8,

        #[arg(long)]
        exp_year: u16,

        #[arg(long)]
        cvc: String,
    },
    /// View the profile or change the avatar
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Administration
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List every product
    List,
    /// Put one unit of a product in the cart
    AddToCart { product_id: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart and its total
    Show {
        /// Only items whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Set an item's quantity (zero or less does nothing)
    Set {
        item_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Add one to an item's quantity
    Inc { item_id: String },
    /// Take one from an item's quantity
    Dec { item_id: String },
    /// Remove an item
    Remove { item_id: String },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the profile
    Show,
    /// Upload a new avatar image
    Avatar { file: PathBuf },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Manage products
    Products {
        #[command(subcommand)]
        action: AdminProductsAction,
    },
    /// Show cart metrics
    Metrics {
        /// Keep refreshing; press Enter to refresh at once, Ctrl-C to stop
        #[arg(short, long)]
        watch: bool,
    },
}

#[derive(Subcommand)]
enum AdminProductsAction {
    /// Create a product
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        price: Decimal,

        #[arg(short, long)]
        description: String,

        #[arg(short = 'u', long)]
        photo_url: String,
    },
    /// Change a product; omitted fields keep their value
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        price: Option<Decimal>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short = 'u', long)]
        photo_url: Option<String>,
    },
    /// Delete a product
    Delete { id: String },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("Configuration error: {e}"));
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mangaverse_storefront=info,mangaverse_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            output::error(&format!("Failed to initialize: {e}"));
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cli, &state).await {
        tracing::error!(error = %e, "Command failed");
        e.report();
        output::error(&e.user_message());
        if let Some(nav) = e.navigation() {
            output::error(&format!("-> {nav}"));
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, state: &AppState) -> Result<(), CliError> {
    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(state, &email, password).await?;
        }
        Commands::Register {
            name,
            email,
            password,
        } => commands::auth::register(state, &name, &email, password).await?,
        Commands::Logout => commands::auth::logout(state)?,
        Commands::Whoami => commands::auth::whoami(state)?,
        Commands::Products { action } => match action {
            ProductsAction::List => commands::catalog::list(state).await?,
            ProductsAction::AddToCart { product_id } => {
                commands::cart::add_product(state, &product_id).await?;
            }
        },
        Commands::Cart { action } => match action {
            CartAction::Show { filter } => commands::cart::show(state, filter.as_deref()).await?,
            CartAction::Set { item_id, quantity } => {
                commands::cart::set_quantity(state, &item_id, quantity).await?;
            }
            CartAction::Inc { item_id } => commands::cart::step(state, &item_id, 1).await?,
            CartAction::Dec { item_id } => commands::cart::step(state, &item_id, -1).await?,
            CartAction::Remove { item_id } => commands::cart::remove(state, &item_id).await?,
        },
        Commands::Checkout {
            card_number,
            exp_month,
            exp_year,
            cvc,
        } => {
            commands::checkout::pay(state, card_number, exp_month, exp_year, cvc).await?;
        }
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::profile::show(state).await?,
            ProfileAction::Avatar { file } => commands::profile::avatar(state, &file).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Products { action } => match action {
                AdminProductsAction::Create {
                    name,
                    price,
                    description,
                    photo_url,
                } => {
                    let draft = mangaverse_core::ProductDraft {
                        name,
                        price,
                        description,
                        photo_url,
                    };
                    commands::admin::create_product(state, &draft).await?;
                }
                AdminProductsAction::Update {
                    id,
                    name,
                    price,
                    description,
                    photo_url,
                } => {
                    let changes = commands::admin::ProductChanges {
                        name,
                        price,
                        description,
                        photo_url,
                    };
                    commands::admin::update_product(state, &id, changes).await?;
                }
                AdminProductsAction::Delete { id } => commands::admin::delete_product(state, &id).await?,
            },
            AdminAction::Metrics { watch } => commands::admin::metrics(state, watch).await?,
        },
    }
    Ok(())
}
