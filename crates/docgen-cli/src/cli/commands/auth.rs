//! Auth command handlers.

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use anyhow::Result;
use docgen_core::controller::{Controller, InitOutcome};
use docgen_core::oauth::{CONFLUENCE_STATE, OAuthCallback, Provider};
use docgen_core::session::mask_token;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn login_github(controller: &Controller) -> Result<()> {
    if let Some(existing) = controller.session().github_token {
        println!("Already logged in to GitHub (token: {})", mask_token(&existing));
        println!("Run `docgen logout` first to switch accounts.");
        return Ok(());
    }

    let auth_url = controller.login_with_github()?;

    println!("To log in with GitHub:");
    println!();
    println!("  1. A browser window will open (or visit the URL below)");
    println!("  2. Authorize the app for your GitHub account");
    println!("  3. If redirected to localhost, return here to continue");
    println!("  4. Otherwise, paste the redirect URL or code");
    println!();
    println!("Authorization URL:");
    println!("  {auth_url}");
    println!();

    let input = receive_redirect(controller)?;
    let outcome = controller.initialize(&OAuthCallback::parse(&input)).await?;
    report_outcome(controller, outcome)
}

pub async fn link_confluence(controller: &Controller) -> Result<()> {
    if let Some(existing) = controller.session().confluence_token {
        println!(
            "Confluence account already linked (token: {})",
            mask_token(&existing)
        );
        println!("Run `docgen logout` first to link a different account.");
        return Ok(());
    }

    let auth_url = controller.link_confluence_account()?;

    println!("To link your Confluence account:");
    println!();
    println!("  1. A browser window will open (or visit the URL below)");
    println!("  2. Pick the site and grant consent");
    println!("  3. If redirected to localhost, return here to continue");
    println!("  4. Otherwise, paste the redirect URL or code");
    println!();
    println!("Authorization URL:");
    println!("  {auth_url}");
    println!();

    let input = receive_redirect(controller)?;
    let mut callback = OAuthCallback::parse(&input);
    // A pasted bare code carries no state; this flow is Confluence either way.
    if callback.state.is_none() {
        callback.state = Some(CONFLUENCE_STATE.to_string());
    }
    let outcome = controller.initialize(&callback).await?;
    report_outcome(controller, outcome)
}

pub async fn callback(controller: &Controller, input: &str, confluence: bool) -> Result<()> {
    let mut callback = OAuthCallback::parse(input);
    if confluence && callback.state.is_none() {
        callback.state = Some(CONFLUENCE_STATE.to_string());
    }
    let outcome = controller.initialize(&callback).await?;
    report_outcome(controller, outcome)
}

pub fn logout(controller: &Controller) -> Result<()> {
    let had_tokens = controller.logout()?;

    if had_tokens {
        println!("✓ Logged out");
        println!("  Tokens removed from: {}", controller.store().path().display());
    } else {
        println!("Not logged in (no tokens found).");
    }

    Ok(())
}

pub fn status(controller: &Controller) {
    let session = controller.session();

    match session.github_token.as_deref() {
        Some(token) => println!("GitHub:     linked (token: {})", mask_token(token)),
        None => println!("GitHub:     not linked (run `docgen login`)"),
    }
    match session.confluence_token.as_deref() {
        Some(token) => println!(
            "Confluence: linked (token: {}, cloud id: {})",
            mask_token(token),
            session.confluence_cloud_id.as_deref().unwrap_or("unknown")
        ),
        None => println!("Confluence: not linked (run `docgen link-confluence`)"),
    }
    println!("Backend:    {}", controller.config().backend_url);
}

fn report_outcome(controller: &Controller, outcome: InitOutcome) -> Result<()> {
    match outcome {
        InitOutcome::NoCode => anyhow::bail!("No authorization code found in redirect"),
        InitOutcome::AlreadyLinked(provider) => {
            println!("{} account already linked.", provider.display_name());
            Ok(())
        }
        InitOutcome::Linked(provider) => {
            let session = controller.session();
            let token = match provider {
                Provider::GitHub => session.github_token,
                Provider::Confluence => session.confluence_token,
            };
            println!();
            println!(
                "✓ Linked {} account (token: {})",
                provider.display_name(),
                token.as_deref().map(mask_token).unwrap_or_default()
            );
            println!("  Tokens saved to: {}", controller.store().path().display());
            Ok(())
        }
        InitOutcome::Failed(provider) => anyhow::bail!(
            "{} login did not complete. Try again.",
            provider.display_name()
        ),
    }
}

/// Gets the redirect from the local listener in interactive sessions, or
/// from a pasted line otherwise.
fn receive_redirect(controller: &Controller) -> Result<String> {
    let local = if io::stdin().is_terminal() {
        controller
            .config()
            .redirect_listen_addr()
            .ok()
            .and_then(|(host, port)| wait_for_local_redirect(&host, port))
    } else {
        None
    };
    if let Some(query) = local {
        return Ok(query);
    }

    print!("Paste the redirect URL (or code): ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    if input.trim().is_empty() {
        anyhow::bail!("Authorization code cannot be empty");
    }
    Ok(input)
}

/// Serves one OAuth redirect on `host:port` and returns its query string.
///
/// Requests without a `code` (favicon and the like) get a 404 and the wait
/// continues until the deadline.
fn wait_for_local_redirect(host: &str, port: u16) -> Option<String> {
    let listener = match TcpListener::bind((host, port)) {
        Ok(listener) => listener,
        Err(err) => {
            tracing::debug!(error = %err, port, "cannot listen for OAuth redirect");
            return None;
        }
    };
    let _ = listener.set_nonblocking(true);

    let (tx, rx) = std::sync::mpsc::channel::<Option<String>>();

    std::thread::spawn(move || {
        let start = std::time::Instant::now();
        loop {
            match listener.accept() {
                Ok((mut stream, _)) => {
                    let _ = stream.set_nonblocking(false);
                    let mut buffer = [0u8; 4096];
                    let n = stream.read(&mut buffer).unwrap_or(0);
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let query = extract_query_from_request(&request);
                    let response = if query.is_some() {
                        oauth_success_response()
                    } else {
                        not_found_response()
                    };
                    let _ = stream.write_all(response.as_bytes());
                    if query.is_some() {
                        let _ = tx.send(query);
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if start.elapsed() > CALLBACK_TIMEOUT {
                        let _ = tx.send(None);
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(_) => {
                    let _ = tx.send(None);
                    break;
                }
            }
        }
    });

    rx.recv_timeout(CALLBACK_TIMEOUT).ok().flatten()
}

/// Query string of an HTTP request line, if it carries a `code`.
fn extract_query_from_request(request: &str) -> Option<String> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;

    let url = url::Url::parse(&format!("http://localhost{target}")).ok()?;
    let callback = OAuthCallback::parse(url.as_str());
    callback.code.as_ref()?;
    url.query().map(ToString::to_string)
}

fn oauth_success_response() -> String {
    let body = "<!doctype html><html><head><meta charset=\"utf-8\" /><title>Authentication successful</title></head><body><p>Authentication successful. Return to your terminal to continue.</p></body></html>";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn not_found_response() -> String {
    let body = "Not found";
    format!(
        "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}
