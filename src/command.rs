//! Command dispatch with a call-time auth middleware.
//!
//! Commands are an explicit enumerated table, not a reflective registry:
//! [`CommandKind::parse`] maps a name to a variant tagged as either public
//! or user-scoped, and [`dispatch`] resolves the current user before any
//! user-scoped handler runs. Resolution happens on every invocation so a
//! `login` in one process run is picked up by the next.

use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::follow::{self, FollowError};
use crate::ingest::{self, IngestError};
use crate::storage::{Database, NewUser, StoreError, User};
use chrono::Utc;
use std::path::PathBuf;
use uuid::Uuid;

/// Everything a handler needs: the store, an HTTP client, and the session
/// config with the path to write it back to.
pub struct State {
    pub db: Database,
    pub client: reqwest::Client,
    pub config: Config,
    pub config_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),
    #[error("Wrong number of arguments: expected {expected}, got {got}")]
    WrongArgumentCount { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No user is currently logged in; run 'register <name>' or 'login <name>' first")]
    NoCurrentUser,
}

/// Umbrella error for one command invocation. `main` prints it and exits 1.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Follow(#[from] FollowError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("User '{0}' not found")]
    UserNotFound(String),
}

/// Commands that run without a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicCommand {
    Register,
    Login,
    Reset,
    Users,
    Agg,
    Feeds,
}

/// Commands whose handler takes the logged-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    AddFeed,
    Follow,
    Following,
    Unfollow,
}

/// The full command table. The tag is structural so a user-scoped handler
/// can only be reached with a resolved [`User`] in hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Public(PublicCommand),
    RequiresUser(UserCommand),
}

impl CommandKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "register" => Some(Self::Public(PublicCommand::Register)),
            "login" => Some(Self::Public(PublicCommand::Login)),
            "reset" => Some(Self::Public(PublicCommand::Reset)),
            "users" => Some(Self::Public(PublicCommand::Users)),
            "agg" => Some(Self::Public(PublicCommand::Agg)),
            "feeds" => Some(Self::Public(PublicCommand::Feeds)),
            "addfeed" => Some(Self::RequiresUser(UserCommand::AddFeed)),
            "follow" => Some(Self::RequiresUser(UserCommand::Follow)),
            "following" => Some(Self::RequiresUser(UserCommand::Following)),
            "unfollow" => Some(Self::RequiresUser(UserCommand::Unfollow)),
            _ => None,
        }
    }

    /// Whether the middleware must resolve a user before the handler runs.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::RequiresUser(_))
    }
}

/// Look up the command, resolve the current user if it needs one, and run it.
pub async fn dispatch(state: &mut State, name: &str, args: &[String]) -> Result<(), CommandError> {
    let kind =
        CommandKind::parse(name).ok_or_else(|| DispatchError::UnknownCommand(name.to_string()))?;

    match kind {
        CommandKind::Public(cmd) => match cmd {
            PublicCommand::Register => register(state, args).await,
            PublicCommand::Login => login(state, args).await,
            PublicCommand::Reset => reset(state, args).await,
            PublicCommand::Users => users(state, args).await,
            PublicCommand::Agg => agg(state, args).await,
            PublicCommand::Feeds => feeds(state, args).await,
        },
        CommandKind::RequiresUser(cmd) => {
            // Auth middleware: resolved at call time, never cached across
            // invocations, and short-circuits before the handler is reached.
            let user = resolve_current_user(state).await?;
            match cmd {
                UserCommand::AddFeed => add_feed(state, args, &user).await,
                UserCommand::Follow => follow_cmd(state, args, &user).await,
                UserCommand::Following => following(state, args, &user).await,
                UserCommand::Unfollow => unfollow(state, args, &user).await,
            }
        }
    }
}

/// Resolve the logged-in user from the config file and the store.
///
/// An unset username fails before the repository is consulted; a username
/// pointing at a user the store no longer has fails the same way.
async fn resolve_current_user(state: &State) -> Result<User, CommandError> {
    let name = state
        .config
        .current_user()
        .ok_or(AuthError::NoCurrentUser)?;
    state
        .db
        .get_user_by_name(name)
        .await?
        .ok_or(CommandError::Auth(AuthError::NoCurrentUser))
}

/// Handlers validate their own arity.
fn expect_args<'a>(args: &'a [String], expected: usize) -> Result<&'a [String], DispatchError> {
    if args.len() != expected {
        return Err(DispatchError::WrongArgumentCount {
            expected,
            got: args.len(),
        });
    }
    Ok(args)
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(state: &mut State, args: &[String]) -> Result<(), CommandError> {
    let args = expect_args(args, 1)?;
    let name = &args[0];

    let now = Utc::now().timestamp();
    let user = state
        .db
        .create_user(NewUser {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: name.clone(),
        })
        .await?;

    state
        .config
        .set_current_user(&user.name, &state.config_path)?;
    tracing::info!(user = %user.name, id = %user.id, "User registered");
    println!("User '{}' registered and logged in", user.name);
    Ok(())
}

async fn login(state: &mut State, args: &[String]) -> Result<(), CommandError> {
    let args = expect_args(args, 1)?;
    let name = &args[0];

    let user = state
        .db
        .get_user_by_name(name)
        .await?
        .ok_or_else(|| CommandError::UserNotFound(name.clone()))?;

    state
        .config
        .set_current_user(&user.name, &state.config_path)?;
    println!("Logged in as '{}'", user.name);
    Ok(())
}

async fn reset(state: &mut State, args: &[String]) -> Result<(), CommandError> {
    expect_args(args, 0)?;
    state.db.reset_users().await?;
    tracing::info!("Database reset");
    println!("Database reset");
    Ok(())
}

async fn users(state: &mut State, args: &[String]) -> Result<(), CommandError> {
    expect_args(args, 0)?;
    let current = state.config.current_user();
    for user in state.db.list_users().await? {
        if current == Some(user.name.as_str()) {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

/// Manual single ingestion of one registered feed.
async fn agg(state: &mut State, args: &[String]) -> Result<(), CommandError> {
    let args = expect_args(args, 1)?;
    let url = &args[0];

    let feed = state
        .db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| FollowError::FeedNotFound(url.clone()))?;

    let outcome = ingest::ingest_feed(&state.db, &state.client, feed.id, &feed.url).await?;
    println!(
        "Ingested '{}': {} new posts, {} already seen",
        feed.name, outcome.new_posts, outcome.skipped
    );
    Ok(())
}

async fn add_feed(state: &mut State, args: &[String], user: &User) -> Result<(), CommandError> {
    let args = expect_args(args, 2)?;
    let (name, url) = (&args[0], &args[1]);

    let feed = follow::create_feed(&state.db, user, name, url).await?;
    println!("Feed '{}' added", feed.name);
    println!("  id:  {}", feed.id);
    println!("  url: {}", feed.url);
    Ok(())
}

async fn feeds(state: &mut State, args: &[String]) -> Result<(), CommandError> {
    expect_args(args, 0)?;
    for feed in follow::all_feeds(&state.db).await? {
        println!("* {} ({}) added by {}", feed.name, feed.url, feed.owner);
    }
    Ok(())
}

async fn follow_cmd(state: &mut State, args: &[String], user: &User) -> Result<(), CommandError> {
    let args = expect_args(args, 1)?;
    let (feed, _) = follow::follow_feed(&state.db, user, &args[0]).await?;
    println!("Feed '{}' followed by {}", feed.name, user.name);
    Ok(())
}

async fn following(state: &mut State, args: &[String], user: &User) -> Result<(), CommandError> {
    expect_args(args, 0)?;
    println!("Feeds followed by {}:", user.name);
    for name in follow::followed_feed_names(&state.db, &user.name).await? {
        println!("* {}", name);
    }
    Ok(())
}

async fn unfollow(state: &mut State, args: &[String], user: &User) -> Result<(), CommandError> {
    let args = expect_args(args, 1)?;
    follow::unfollow_feed(&state.db, user, &args[0]).await?;
    println!("Unfollowed {}", args[0]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_state(dir: &TempDir) -> State {
        State {
            db: Database::open(":memory:").await.unwrap(),
            client: reqwest::Client::new(),
            config: Config::default(),
            config_path: dir.path().join("config.toml"),
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_command_table_tags() {
        for name in ["register", "login", "reset", "users", "agg", "feeds"] {
            let kind = CommandKind::parse(name).unwrap();
            assert!(!kind.requires_login(), "{name} must not require a session");
        }
        for name in ["addfeed", "follow", "following", "unfollow"] {
            let kind = CommandKind::parse(name).unwrap();
            assert!(kind.requires_login(), "{name} must require a session");
        }
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir).await;

        let err = dispatch(&mut state, "frobnicate", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Dispatch(DispatchError::UnknownCommand(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_argument_count() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir).await;

        let err = dispatch(&mut state, "register", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Dispatch(DispatchError::WrongArgumentCount {
                expected: 1,
                got: 0
            })
        ));
    }

    #[tokio::test]
    async fn test_login_required_command_gated_without_user() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir).await;

        // No current user set: the middleware must short-circuit before the
        // handler can reach the store.
        let err = dispatch(&mut state, "following", &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::Auth(AuthError::NoCurrentUser)));
    }

    #[tokio::test]
    async fn test_stale_username_is_gated() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir).await;

        // Config points at a user the store never had
        state.config.current_user = "ghost".into();
        let err = dispatch(&mut state, "following", &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::Auth(AuthError::NoCurrentUser)));
    }

    #[tokio::test]
    async fn test_register_sets_current_user() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir).await;

        dispatch(&mut state, "register", &args(&["ann"])).await.unwrap();
        assert_eq!(state.config.current_user(), Some("ann"));

        // Persisted, not just in memory
        let reloaded = Config::load(&state.config_path).unwrap();
        assert_eq!(reloaded.current_user(), Some("ann"));
    }

    #[tokio::test]
    async fn test_register_duplicate_name_fails() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir).await;

        dispatch(&mut state, "register", &args(&["ann"])).await.unwrap();
        let err = dispatch(&mut state, "register", &args(&["ann"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Store(StoreError::UniqueViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_user_fails() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir).await;

        let err = dispatch(&mut state, "login", &args(&["nobody"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_login_switches_user() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir).await;

        dispatch(&mut state, "register", &args(&["ann"])).await.unwrap();
        dispatch(&mut state, "register", &args(&["ben"])).await.unwrap();
        dispatch(&mut state, "login", &args(&["ann"])).await.unwrap();
        assert_eq!(state.config.current_user(), Some("ann"));
    }
}
