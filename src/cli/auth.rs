use crate::{cli::fail_auth, config::Settings, info, spotify};

pub async fn auth(settings: &Settings) {
    info!(
        "Authorizing with the {} strategy.",
        settings.auth.strategy
    );
    if let Err(e) = spotify::authenticate(settings).await {
        fail_auth(&e);
    }
}
