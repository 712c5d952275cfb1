//! Portal login.

use tracing::{debug, info};

use crate::config::{LoginTarget, SubmitTrigger};
use crate::errors::{AutomationError, AutomationResult};
use crate::locator::WaitFor;
use crate::session::Session;
use crate::types::Credentials;

/// Fill and submit a login form, then wait for the post-login marker.
///
/// A missing marker becomes [`AutomationError::Login`] wrapping the wait error.
/// Missing form fields surface as element errors.
pub async fn login(
    session: &Session,
    target: &LoginTarget,
    credentials: &Credentials,
) -> AutomationResult<()> {
    let timeouts = session.timeouts();
    info!(target = %target.name, user = %credentials.username, "Logging in");
    session.goto(&target.url).await?;

    if let Some(pre_login) = &target.pre_login {
        // Some portals land on the form directly
        match session
            .click_locator(pre_login, timeouts.interactable())
            .await
        {
            Ok(()) => debug!("Opened login form via {}", pre_login),
            Err(e) => debug!("No pre-login link ({}), assuming form is shown", e),
        }
    }

    let username = session
        .wait_for(&target.username_field, WaitFor::Visible, timeouts.element())
        .await?;
    session.fill(&username, &credentials.username).await?;

    let password = session
        .wait_for(&target.password_field, WaitFor::Presence, timeouts.element())
        .await?;
    session.fill(&password, &credentials.password).await?;

    match &target.submit {
        SubmitTrigger::EnterKey => session.press_enter(&password).await?,
        SubmitTrigger::Click { locator } => {
            session.click_locator(locator, timeouts.element()).await?
        }
    }

    session
        .wait_for(
            &target.post_login_marker,
            WaitFor::Presence,
            timeouts.login_marker(),
        )
        .await
        .map_err(|cause| AutomationError::login(&target.name, cause))?;

    info!(target = %target.name, "Login succeeded");
    Ok(())
}
