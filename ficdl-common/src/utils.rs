use isahc::{
    config::{Configurable as _, RedirectPolicy},
    AsyncReadResponseExt as _, HttpClient, Request,
};
use rand::Rng;
use tracing::{Instrument, Span};

use crate::Uri;

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible) ficdl/",
    env!("CARGO_PKG_VERSION"),
);

#[tracing::instrument(err, skip(url), fields(url = %url.to_string()))]
pub async fn req(url: &Uri) -> Result<String, crate::Report> {
    tracing::info!("fetching");

    let client = HttpClient::builder()
        .default_header("User-Agent", USER_AGENT)
        .build()?;

    let req = Request::builder()
        .redirect_policy(RedirectPolicy::Follow)
        .uri(url)
        .body(())?;

    let mut res = client.send_async(req).await?;

    let html = res.text().await?;

    Ok(html)
}

/// Waits a random number of seconds below `max_secs` before the next fetch.
#[tracing::instrument(err)]
pub async fn sleep(max_secs: u64) -> Result<(), crate::Report> {
    if max_secs < 2 {
        return Ok(());
    }

    tokio::task::spawn_blocking({
        let span = Span::current();

        move || {
            let _ = span.enter();

            let length = rand::thread_rng().gen_range(1..max_secs);

            tracing::info!("[util] Sleeping for {} seconds", length);

            std::thread::sleep(std::time::Duration::from_secs(length));
        }
    })
    .instrument(Span::current())
    .await
    .expect("Thread pool closed");

    Ok(())
}
