use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use sauce_boss_core::{
    handle_request, image_for, ContentStore, Request, RequestEnvelope, ResponseEnvelope, SauceId,
    ScreenDocuments, SessionState,
};
use sauce_boss_store_sqlite::{SchemaStatus, SessionSummary, SqliteSessionStore, StoredSession};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

pub const API_CONTRACT_VERSION: &str = "api.v1";

const STRINGS_FILE: &str = "strings.json";
const RECIPES_FILE: &str = "recipes.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateResult {
    pub dry_run: bool,
    pub current_version: i64,
    pub target_version: i64,
    pub would_apply_versions: Vec<i64>,
    pub after_version: Option<i64>,
    pub up_to_date: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeView {
    pub id: SauceId,
    pub name: String,
    pub instructions: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeListing {
    /// Tag the listing was resolved for, after default-language fallback.
    pub locale: String,
    pub recipes: Vec<RecipeView>,
}

#[derive(Debug, Clone)]
pub struct SauceBossApi {
    content: Arc<ContentStore>,
    session_db: Option<PathBuf>,
}

impl SauceBossApi {
    #[must_use]
    pub fn new(content: ContentStore) -> Self {
        Self { content: Arc::new(content), session_db: None }
    }

    /// Persist session state in a `SQLite` file instead of the envelope.
    #[must_use]
    pub fn with_session_db(mut self, db_path: PathBuf) -> Self {
        self.session_db = Some(db_path);
        self
    }

    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    #[must_use]
    pub fn session_db(&self) -> Option<&Path> {
        self.session_db.as_deref()
    }

    fn open_store(&self) -> Result<SqliteSessionStore> {
        let db_path = self
            .session_db
            .as_deref()
            .ok_or_else(|| anyhow!("no session database configured"))?;
        SqliteSessionStore::open(db_path)
    }

    fn open_migrated_store(&self) -> Result<SqliteSessionStore> {
        let mut store = self.open_store()?;
        store.migrate()?;
        Ok(store)
    }

    /// Answer one platform request with a thread-local random source.
    #[must_use]
    pub fn handle(&self, envelope: &RequestEnvelope) -> ResponseEnvelope {
        self.handle_with_rng(envelope, &mut rand::thread_rng())
    }

    /// Answer one platform request.
    ///
    /// Session state is read before and written after the skill runs. Store
    /// faults are logged and never fail the response.
    pub fn handle_with_rng<R: Rng + ?Sized>(
        &self,
        envelope: &RequestEnvelope,
        rng: &mut R,
    ) -> ResponseEnvelope {
        let session_id = envelope.session_id();
        tracing::info!(
            request_type = envelope.request.type_name(),
            locale = envelope.request.locale().unwrap_or("none"),
            session_id = session_id.unwrap_or("none"),
            "request envelope received"
        );

        let mut state = self.load_state(envelope);
        let body = handle_request(envelope, &self.content, &mut state, rng);
        let mut response = ResponseEnvelope::new(body);

        if matches!(envelope.request, Request::SessionEnded(_)) {
            self.end_session(session_id);
        } else if self.session_db.is_some() {
            self.save_state(session_id, &state);
        } else {
            match state.to_attributes() {
                Ok(attributes) => response.session_attributes = attributes,
                Err(err) => tracing::error!(error = %err, "failed to encode session attributes"),
            }
        }

        tracing::info!(
            speech = response.response.speech_text().unwrap_or(""),
            directives = response.response.directives.len(),
            should_end_session = ?response.response.should_end_session,
            "response envelope ready"
        );
        response
    }

    fn load_state(&self, envelope: &RequestEnvelope) -> SessionState {
        if self.session_db.is_none() {
            let attributes =
                envelope.session.as_ref().and_then(|session| session.attributes.as_ref());
            return SessionState::from_attributes_or_default(attributes);
        }
        let Some(session_id) = envelope.session_id() else {
            return SessionState::default();
        };
        let loaded = self.open_migrated_store().and_then(|store| store.load_session(session_id));
        match loaded {
            Ok(Some(stored)) => stored.state,
            Ok(None) => SessionState::default(),
            Err(err) => {
                tracing::error!(
                    session_id,
                    error = %format!("{err:#}"),
                    "failed to load session; starting fresh"
                );
                SessionState::default()
            }
        }
    }

    fn save_state(&self, session_id: Option<&str>, state: &SessionState) {
        let Some(session_id) = session_id else {
            tracing::warn!("request has no session id; state not persisted");
            return;
        };
        let saved = self
            .open_migrated_store()
            .and_then(|mut store| store.save_session(session_id, state));
        if let Err(err) = saved {
            tracing::error!(session_id, error = %format!("{err:#}"), "failed to save session");
        }
    }

    fn end_session(&self, session_id: Option<&str>) {
        let (Some(session_id), Some(_)) = (session_id, self.session_db.as_ref()) else {
            return;
        };
        match self.open_migrated_store().and_then(|mut store| store.delete_session(session_id)) {
            Ok(deleted) => tracing::info!(session_id, deleted, "session state discarded"),
            Err(err) => {
                let error = format!("{err:#}");
                tracing::error!(session_id, error = %error, "failed to delete session");
            }
        }
    }

    /// Recipes of the bundle resolved for `locale`, with image URLs.
    #[must_use]
    pub fn recipes(&self, locale: &str) -> RecipeListing {
        let bundle = self.content.resolve_or_default(Some(locale));
        RecipeListing {
            locale: bundle.locale.clone(),
            recipes: bundle
                .recipes
                .into_values()
                .map(|recipe| RecipeView {
                    image_url: image_for(recipe.id.as_str()),
                    id: recipe.id,
                    name: recipe.name,
                    instructions: recipe.instructions,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn locales(&self) -> Vec<String> {
        self.content.locales()
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when no session database is configured or it cannot be queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = self.open_store()?;
        store.schema_status()
    }

    /// Apply pending migrations, or return planned versions for dry-run mode.
    ///
    /// # Errors
    /// Returns an error when migration planning or execution fails.
    pub fn migrate(&self, dry_run: bool) -> Result<MigrateResult> {
        let mut store = self.open_store()?;
        let before = store.schema_status()?;
        if dry_run {
            return Ok(MigrateResult {
                dry_run: true,
                current_version: before.current_version,
                target_version: before.target_version,
                would_apply_versions: before.pending_versions,
                after_version: None,
                up_to_date: None,
            });
        }

        let planned_versions = before.pending_versions;
        store.migrate()?;
        let after = store.schema_status()?;
        Ok(MigrateResult {
            dry_run: false,
            current_version: before.current_version,
            target_version: before.target_version,
            would_apply_versions: planned_versions,
            after_version: Some(after.current_version),
            up_to_date: Some(after.pending_versions.is_empty()),
        })
    }

    /// Fetch one persisted session.
    ///
    /// # Errors
    /// Returns an error when lookup fails or the session does not exist.
    pub fn session_show(&self, session_id: &str) -> Result<StoredSession> {
        let store = self.open_migrated_store()?;
        store.load_session(session_id)?.ok_or_else(|| anyhow!("session not found: {session_id}"))
    }

    /// # Errors
    /// Returns an error when the session database cannot be read.
    pub fn session_list(&self) -> Result<Vec<SessionSummary>> {
        self.open_migrated_store()?.list_sessions()
    }

    /// Delete one persisted session. Returns whether it existed.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn session_clear(&self, session_id: &str) -> Result<bool> {
        self.open_migrated_store()?.delete_session(session_id)
    }

    /// Delete sessions idle for longer than `idle`. Returns the number removed.
    ///
    /// # Errors
    /// Returns an error when the purge fails.
    pub fn session_purge(&self, idle: time::Duration) -> Result<usize> {
        let cutoff = OffsetDateTime::now_utc() - idle;
        self.open_migrated_store()?.purge_sessions_before(cutoff)
    }

    /// Create a `SQLite` backup of the session database.
    ///
    /// # Errors
    /// Returns an error when no database is configured or the backup fails.
    pub fn backup(&self, out_file: &Path) -> Result<()> {
        self.open_store()?.backup_database(out_file)
    }
}

/// Load content, either embedded or from a directory holding `strings.json`,
/// `recipes.json` and optionally `documents/{launch,recipe,help}.json`.
///
/// # Errors
/// Returns an error when a file cannot be read or the content fails validation.
pub fn load_content(content_dir: Option<&Path>, default_language: &str) -> Result<ContentStore> {
    let Some(dir) = content_dir else {
        return ContentStore::embedded(default_language).context("embedded content is invalid");
    };

    let strings = read_text(&dir.join(STRINGS_FILE))?;
    let recipes = read_text(&dir.join(RECIPES_FILE))?;
    let mut content = ContentStore::from_json(&strings, &recipes, default_language)
        .with_context(|| format!("content in {} is invalid", dir.display()))?;

    let documents_dir = dir.join("documents");
    if documents_dir.is_dir() {
        let embedded = content.documents().clone();
        let documents = ScreenDocuments {
            launch: read_document(&documents_dir.join("launch.json"), embedded.launch)?,
            recipe: read_document(&documents_dir.join("recipe.json"), embedded.recipe)?,
            help: read_document(&documents_dir.join("help.json"), embedded.help)?,
        };
        content = content.with_documents(documents);
    }

    tracing::info!(
        content_dir = %dir.display(),
        locales = content.locales().len(),
        "loaded content from directory"
    );
    Ok(content)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_document(path: &Path, fallback: Value) -> Result<Value> {
    if !path.exists() {
        return Ok(fallback);
    }
    serde_json::from_str(&read_text(path)?)
        .with_context(|| format!("failed to parse screen document {}", path.display()))
}
