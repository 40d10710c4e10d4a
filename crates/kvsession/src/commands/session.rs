//! Session commands - get, put, refresh, delete.

use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use kvsession_store::{Session, SessionData, SessionId};

use super::Context;

/// Arguments for the get command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Session ID
    pub id: String,
}

/// Arguments for the put command.
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Session ID (generated when omitted)
    pub id: Option<String>,

    /// Session data as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub data: String,
}

/// Arguments for the refresh command.
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Session ID
    pub id: String,
}

/// Arguments for the delete command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Session ID
    pub id: String,
}

#[derive(Serialize)]
struct SessionView<'a> {
    session_id: &'a str,
    data: &'a SessionData,
    creation: DateTime<Utc>,
    expiration: DateTime<Utc>,
}

impl<'a> From<&'a Session> for SessionView<'a> {
    fn from(session: &'a Session) -> Self {
        Self {
            session_id: session.id().as_str(),
            data: session.data(),
            creation: session.creation(),
            expiration: session.expiration(),
        }
    }
}

fn print_session(session: &Session, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&SessionView::from(session))?);
    } else {
        println!("Session:    {}", session.id());
        println!("Created:    {}", session.creation().to_rfc3339());
        println!("Expires:    {}", session.expiration().to_rfc3339());
        println!("Data:       {}", serde_json::to_string(session.data())?);
    }
    Ok(())
}

/// Show a live session.
pub async fn get(args: GetArgs, ctx: &Context) -> Result<()> {
    let manager = ctx.open_manager()?;
    let id = SessionId::new(args.id);

    match manager.restore_session(&id).await? {
        Some(session) => print_session(&session, ctx),
        None => bail!("no live session '{}'", id),
    }
}

/// Create a session, or replace the data of a live one.
///
/// Replacing keeps the stored creation time and expiration.
pub async fn put(args: PutArgs, ctx: &Context) -> Result<()> {
    let manager = ctx.open_manager()?;
    let data: SessionData =
        serde_json::from_str(&args.data).context("--data must be a JSON object")?;
    let id = args.id.map(SessionId::new).unwrap_or_else(SessionId::generate);

    let session = match manager.restore_session(&id).await? {
        Some(mut existing) => {
            *existing.data_mut() = data;
            existing
        }
        None => manager.new_session(id, data),
    };

    manager.update_session(&session).await?;
    tracing::debug!(session_id = %session.id(), "Session stored");
    print_session(&session, ctx)
}

/// Restart a session's expiration window.
pub async fn refresh(args: RefreshArgs, ctx: &Context) -> Result<()> {
    let manager = ctx.open_manager()?;
    let id = SessionId::new(args.id);

    match manager.refresh_session(&id).await? {
        Some(session) => print_session(&session, ctx),
        None => bail!("no live session '{}'", id),
    }
}

/// Delete a session.
pub async fn delete(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let manager = ctx.open_manager()?;
    let id = SessionId::new(args.id);
    manager.delete_session(&id).await?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "deleted": id.as_str() }));
    } else {
        println!("Deleted session {}", id);
    }
    Ok(())
}
