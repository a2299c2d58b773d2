//! Lumière CLI - Browse the catalog, manage a cart and place orders.
//!
//! # Usage
//!
//! ```bash
//! # Browse (no sign-in needed)
//! lumiere products featured
//! lumiere products category skincare
//! lumiere products show 1b4e28ba-2fa1-11d2-883f-0016d3cca427
//!
//! # Account, cart and orders (signs in first)
//! export LUMIERE_PASSWORD=...
//! lumiere --email camille@example.com account sign-up
//! lumiere --email camille@example.com account update --full-name "Camille Laurent" \
//!     --street "5 Avenue Montaigne" --city Paris --state IDF \
//!     --postal-code 75008 --country FR
//! lumiere --email camille@example.com cart add 1b4e28ba-... --quantity 2
//! lumiere --email camille@example.com cart show
//! lumiere --email camille@example.com checkout --shipping-method standard
//! lumiere --email camille@example.com orders --limit 5
//! ```
//!
//! Checkout uses the saved profile addresses unless an address is given.
//!
//! # Environment Variables
//!
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY` - Backend connection (see the
//!   storefront configuration)
//! - `LUMIERE_EMAIL` - Default for `--email`
//! - `LUMIERE_PASSWORD` - Password used to sign in
//! - `RUST_LOG` - Log filter (default: `lumiere_storefront=info,lumiere_cli=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumiere_core::{CartItemId, OrderId, ProductId};
use lumiere_storefront::config::StorefrontConfig;
use lumiere_storefront::error::StorefrontError;
use lumiere_storefront::models::{Address, ProfileUpdate};
use lumiere_storefront::services::checkout::CheckoutRequest;
use lumiere_storefront::state::AppState;

mod commands;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command needs a signed-in user but no email was given.
    #[error("this command requires --email (or LUMIERE_EMAIL)")]
    EmailRequired,

    /// No password given.
    #[error("set LUMIERE_PASSWORD (or --password) to sign in")]
    MissingPassword,

    /// Storefront operation failed.
    #[error(transparent)]
    Storefront(#[from] StorefrontError),
}

impl CliError {
    fn user_message(&self) -> String {
        match self {
            Self::Storefront(err) => err.user_message(),
            _ => self.to_string(),
        }
    }
}

#[derive(Parser)]
#[command(name = "lumiere")]
#[command(author, version, about = "Lumière storefront CLI")]
struct Cli {
    /// Account email; required for cart, checkout and orders
    #[arg(short, long, env = "LUMIERE_EMAIL", global = true)]
    email: Option<String>,

    /// Account password; prefer setting LUMIERE_PASSWORD
    #[arg(long, env = "LUMIERE_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Manage the account
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the cart
    Checkout(CheckoutArgs),
    /// List past orders
    Orders {
        /// Maximum number of orders
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of orders to skip
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one order
    Order {
        /// Order ID
        id: OrderId,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// Featured products
    Featured,
    /// Products in a category
    Category {
        /// Category name (e.g., `skincare`)
        name: String,
    },
    /// One product
    Show {
        /// Product ID
        id: ProductId,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Create an account
    SignUp,
    /// Show the profile
    Profile,
    /// Update the profile
    Update(ProfileArgs),
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        /// Product ID
        product_id: ProductId,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: i32,
    },
    /// Set the quantity of a cart item (0 removes it)
    Update {
        /// Cart item ID
        item_id: CartItemId,

        /// New quantity
        quantity: i32,
    },
    /// Remove a cart item
    Remove {
        /// Cart item ID
        item_id: CartItemId,
    },
    /// Empty the cart
    Clear,
}

/// Shipping address flags. Either all or none must be given.
#[derive(clap::Args)]
struct AddressArgs {
    #[arg(long)]
    street: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    postal_code: Option<String>,

    #[arg(long)]
    country: Option<String>,
}

impl AddressArgs {
    fn into_address(self) -> Option<Address> {
        address_from_parts([
            self.street,
            self.city,
            self.state,
            self.postal_code,
            self.country,
        ])
    }
}

/// Billing address flags. Either all or none must be given.
#[derive(clap::Args)]
struct BillingAddressArgs {
    #[arg(long)]
    billing_street: Option<String>,

    #[arg(long)]
    billing_city: Option<String>,

    #[arg(long)]
    billing_state: Option<String>,

    #[arg(long)]
    billing_postal_code: Option<String>,

    #[arg(long)]
    billing_country: Option<String>,
}

impl BillingAddressArgs {
    fn into_address(self) -> Option<Address> {
        address_from_parts([
            self.billing_street,
            self.billing_city,
            self.billing_state,
            self.billing_postal_code,
            self.billing_country,
        ])
    }
}

/// `None` when no part was given. Missing parts stay blank so the
/// storefront can name the first one.
fn address_from_parts(parts: [Option<String>; 5]) -> Option<Address> {
    if parts.iter().all(Option::is_none) {
        return None;
    }
    let [street, city, state, postal_code, country] = parts.map(Option::unwrap_or_default);
    Some(Address {
        street,
        city,
        state,
        postal_code,
        country,
    })
}

#[derive(clap::Args)]
struct CheckoutArgs {
    /// Shipping method (e.g., `standard`, `express`)
    #[arg(long)]
    shipping_method: String,

    #[command(flatten)]
    shipping: AddressArgs,

    #[command(flatten)]
    billing: BillingAddressArgs,

    /// Delivery notes
    #[arg(long)]
    notes: Option<String>,
}

impl CheckoutArgs {
    fn into_request(self) -> CheckoutRequest {
        CheckoutRequest {
            shipping_method: self.shipping_method,
            shipping_address: self.shipping.into_address(),
            billing_address: self.billing.into_address(),
            notes: self.notes,
        }
    }
}

#[derive(clap::Args)]
struct ProfileArgs {
    #[arg(long)]
    full_name: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    #[command(flatten)]
    shipping: AddressArgs,

    #[command(flatten)]
    billing: BillingAddressArgs,

    /// Receive the newsletter
    #[arg(long)]
    newsletter: Option<bool>,

    /// Receive marketing emails
    #[arg(long)]
    marketing: Option<bool>,
}

impl ProfileArgs {
    fn into_update(self) -> (ProfileUpdate, commands::account::MailingChoices) {
        let update = ProfileUpdate {
            full_name: self.full_name,
            phone: self.phone,
            shipping_address: self.shipping.into_address(),
            billing_address: self.billing.into_address(),
            preferences: None,
        };
        let mailing = commands::account::MailingChoices {
            newsletter: self.newsletter,
            marketing: self.marketing,
        };
        (update, mailing)
    }
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

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lumiere_storefront=info,lumiere_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env before parsing so `LUMIERE_EMAIL` can come from it
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, config).await {
        if let CliError::Storefront(err) = &e {
            err.report();
        }
        eprintln!("Error: {}", e.user_message());
        // Flush pending Sentry events before exiting
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CliError> {
    let state = AppState::new(config).map_err(StorefrontError::from)?;
    let credentials = Credentials {
        email: cli.email,
        password: cli.password.map(SecretString::from),
    };

    match cli.command {
        Commands::Products { action } => match action {
            ProductsAction::Featured => commands::products::featured(&state).await?,
            ProductsAction::Category { name } => {
                commands::products::category(&state, &name).await?;
            }
            ProductsAction::Show { id } => commands::products::show(&state, id).await?,
        },
        Commands::Account {
            action: AccountAction::SignUp,
        } => {
            let (email, password) = credentials.require()?;
            let result = commands::account::sign_up(&state, email, password).await;
            sign_out(&state).await;
            result?;
        }
        command => {
            credentials.sign_in(&state).await?;
            let result = run_signed_in(&state, command).await;
            sign_out(&state).await;
            result?;
        }
    }
    Ok(())
}

/// Commands that need a signed-in user.
async fn run_signed_in(state: &AppState, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Account {
            action: AccountAction::Profile,
        } => commands::account::show_profile(state).await?,
        Commands::Account {
            action: AccountAction::Update(args),
        } => {
            let (update, mailing) = args.into_update();
            commands::account::update_profile(state, update, mailing).await?;
        }
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(state).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(state, product_id, quantity).await?,
            CartAction::Update { item_id, quantity } => {
                commands::cart::update(state, item_id, quantity).await?;
            }
            CartAction::Remove { item_id } => commands::cart::remove(state, item_id).await?,
            CartAction::Clear => commands::cart::clear(state).await?,
        },
        Commands::Checkout(args) => {
            commands::orders::checkout(state, args.into_request()).await?;
        }
        Commands::Orders { limit, offset } => {
            commands::orders::list(state, limit, offset).await?;
        }
        Commands::Order { id } => commands::orders::show(state, id).await?,
        // Run without a session
        Commands::Products { .. }
        | Commands::Account {
            action: AccountAction::SignUp,
        } => {}
    }
    Ok(())
}

struct Credentials {
    email: Option<String>,
    password: Option<SecretString>,
}

impl Credentials {
    fn require(&self) -> Result<(&str, &SecretString), CliError> {
        let email = self.email.as_deref().ok_or(CliError::EmailRequired)?;
        let password = self.password.as_ref().ok_or(CliError::MissingPassword)?;
        Ok((email, password))
    }

    async fn sign_in(&self, state: &AppState) -> Result<(), CliError> {
        let (email, password) = self.require()?;
        state
            .auth()
            .sign_in_with_password(email, password)
            .await
            .map_err(StorefrontError::from)?;
        Ok(())
    }
}

/// Revoke this run's session. Failing to do so doesn't fail the command.
async fn sign_out(state: &AppState) {
    if state.session().current_user().is_none() {
        return;
    }
    if let Err(e) = state.auth().sign_out().await {
        tracing::warn!(error = %e, "Sign-out failed");
    }
}
