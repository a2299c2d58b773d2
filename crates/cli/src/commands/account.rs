//! Account commands.

use secrecy::SecretString;

use lumiere_storefront::error::Result;
use lumiere_storefront::models::{Address, Profile, ProfileUpdate};
use lumiere_storefront::services::auth::SignUpOutcome;
use lumiere_storefront::state::AppState;

/// Create an account.
///
/// When the account is usable right away its profile is created too;
/// otherwise that happens on first use after confirmation.
pub async fn sign_up(state: &AppState, email: &str, password: &SecretString) -> Result<()> {
    match state.auth().sign_up(email, password).await? {
        SignUpOutcome::SignedIn(user) => {
            state.profiles().current().await?;
            println!("Welcome to Lumière! Signed in as {}.", user.id);
        }
        SignUpOutcome::ConfirmationRequired(_) => {
            println!("Account created. Check {email} for a confirmation link.");
        }
    }
    Ok(())
}

/// Show the profile.
pub async fn show_profile(state: &AppState) -> Result<()> {
    let profile = state.profiles().current().await?;
    print_profile(&profile);
    Ok(())
}

/// Change the newsletter and marketing opt-ins, keeping everything else.
#[derive(Debug, Default)]
pub struct MailingChoices {
    pub newsletter: Option<bool>,
    pub marketing: Option<bool>,
}

/// Update the profile.
pub async fn update_profile(
    state: &AppState,
    mut update: ProfileUpdate,
    mailing: MailingChoices,
) -> Result<()> {
    if mailing.newsletter.is_some() || mailing.marketing.is_some() {
        let mut preferences = state.profiles().current().await?.preferences;
        if let Some(newsletter) = mailing.newsletter {
            preferences.newsletter = newsletter;
        }
        if let Some(marketing) = mailing.marketing {
            preferences.marketing = marketing;
        }
        update.preferences = Some(preferences);
    }

    let profile = state.profiles().update(update).await?;
    println!("Profile saved.");
    print_profile(&profile);
    Ok(())
}

fn print_profile(profile: &Profile) {
    println!("  Name:       {}", profile.full_name.as_deref().unwrap_or("-"));
    println!("  Email:      {}", profile.email.as_deref().unwrap_or("-"));
    println!("  Phone:      {}", profile.phone.as_deref().unwrap_or("-"));
    println!("  Ship to:    {}", address_line(profile.shipping_address.as_ref()));
    println!("  Bill to:    {}", address_line(profile.billing_address.as_ref()));
    println!(
        "  Newsletter: {}",
        if profile.preferences.newsletter { "yes" } else { "no" }
    );
    println!(
        "  Marketing:  {}",
        if profile.preferences.marketing { "yes" } else { "no" }
    );
}

fn address_line(address: Option<&Address>) -> String {
    address.map_or_else(
        || "-".to_string(),
        |a| format!("{}, {}, {} {}, {}", a.street, a.city, a.state, a.postal_code, a.country),
    )
}
