//! Login, logout and status commands.

use tokio::runtime::Runtime;

use super::App;
use crate::api::Credentials;
use crate::scheduler::CancelFlag;
use crate::session::{RestoreOutcome, SessionReconciler};

/// Log in with credentials
pub fn cmd_login(
    rt: &Runtime,
    app: &App,
    phone: Option<&str>,
    email: Option<&str>,
    password: &str,
    country_code: &str,
    captcha: Option<&str>,
) -> anyhow::Result<()> {
    let credentials = match (phone, email) {
        (Some(phone), _) => Credentials::Phone {
            phone: phone.to_string(),
            password: password.to_string(),
            country_code: country_code.to_string(),
            captcha: captcha.map(str::to_string),
        },
        (None, Some(email)) => Credentials::Email {
            email: email.to_string(),
            password: password.to_string(),
            captcha: captcha.map(str::to_string),
        },
        (None, None) => anyhow::bail!("Either --phone or --email is required"),
    };

    rt.block_on(async {
        let session = app.session();
        let result = session.login(&credentials).await;
        session.cancel_recheck();
        result?;

        print_account(&session);
        Ok(())
    })
}

/// Log in by QR code
pub fn cmd_qr_login(rt: &Runtime, app: &App) -> anyhow::Result<()> {
    rt.block_on(async {
        let session = app.session();
        let ticket = session.request_qr().await?;

        println!("Scan this QR code with the NetEase Cloud Music app:");
        if let Some(url) = &ticket.qr_url {
            println!("  Login URL: {}", url);
        }
        if let Some(image) = ticket.qr_image.as_deref().filter(|i| i.starts_with("http")) {
            println!("  Image:     {}", image);
        }
        println!();

        let handle = session.spawn_qr_poll(ticket.key, session.options().qr);
        let mut progress = handle.progress();
        let printer = tokio::spawn(async move {
            let mut last = None;
            while progress.changed().await.is_ok() {
                let Some(report) = progress.borrow_and_update().clone() else {
                    continue;
                };
                if last.as_ref() != Some(&report.status) {
                    println!(
                        "[{}/{}] {}",
                        report.attempt,
                        report.max_attempts,
                        report.status.description()
                    );
                    last = Some(report.status);
                }
            }
        });

        let outcome = handle.outcome().await;
        let _ = printer.await;
        session.cancel_recheck();
        outcome?;

        print_account(&session);
        Ok(())
    })
}

/// Adopt an official-service session
pub fn cmd_official_login(rt: &Runtime, app: &App, wait: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let session = app.session();
        let options = session.options().clone();

        if wait {
            println!("Waiting for a session on the official service...");
            session
                .poll_official(options.official, &CancelFlag::new(), |attempt, max| {
                    tracing::debug!("Official session check {}/{}", attempt, max);
                })
                .await?;
        } else if !session.probe_official(options.probe_timeout).await {
            println!("No active session on the official service.");
            return Ok(());
        }

        print_account(&session);
        session.cancel_recheck();
        Ok(())
    })
}

/// Show the login status
pub fn cmd_status(rt: &Runtime, app: &App, verify: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let session = app.session();
        let outcome = session.restore().await;

        let outcome = if verify && outcome == RestoreOutcome::Trusted {
            let result = session.verify().await;
            if result.is_valid {
                RestoreOutcome::Verified
            } else if result.is_unauthenticated() {
                RestoreOutcome::Expired
            } else {
                RestoreOutcome::Unverified
            }
        } else {
            outcome
        };

        match outcome {
            RestoreOutcome::NoSession => println!("Not logged in."),
            RestoreOutcome::Expired => println!("Session expired. Please log in again."),
            RestoreOutcome::Trusted => {
                print_account(&session);
                println!("  (verified recently)");
            }
            RestoreOutcome::Verified => {
                print_account(&session);
                println!("  (verified now)");
            }
            RestoreOutcome::Unverified => {
                print_account(&session);
                println!("  (could not reach the service, showing cached session)");
            }
        }

        if session.is_logged_in() {
            session.refresh_user_data().await;
            let library = session.state().library;
            println!(
                "  Playlists: {} created, {} subscribed",
                library.created_playlists.len(),
                library.subscribed_playlists.len()
            );
            println!("  Liked tracks: {}", library.liked_ids.len());
        }

        session.cancel_recheck();
        Ok(())
    })
}

/// Log out
pub fn cmd_logout(rt: &Runtime, app: &App) -> anyhow::Result<()> {
    rt.block_on(async {
        let session = app.session();
        session.restore().await;
        session.logout().await;
        println!("Logged out.");
        Ok(())
    })
}

fn print_account(session: &SessionReconciler) {
    let name = session.nickname().unwrap_or_else(|| "unknown".to_string());
    match session.user_id() {
        Some(uid) => println!("Logged in as {} (uid {})", name, uid),
        None => println!("Logged in as {}", name),
    }
    if let Some(avatar) = session.avatar_url() {
        println!("  Avatar: {}", avatar);
    }
}
