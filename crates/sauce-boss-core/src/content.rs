//! Localized prompt and recipe content, and the locale resolver over it.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{SauceId, SkillError};

const EMBEDDED_STRINGS: &str = include_str!("../content/strings.json");
const EMBEDDED_RECIPES: &str = include_str!("../content/recipes.json");
const EMBEDDED_LAUNCH_DOCUMENT: &str = include_str!("../content/documents/launch.json");
const EMBEDDED_RECIPE_DOCUMENT: &str = include_str!("../content/documents/recipe.json");
const EMBEDDED_HELP_DOCUMENT: &str = include_str!("../content/documents/help.json");

const IMAGE_BASE_URL: &str = "https://s3.amazonaws.com/ask-samples-resources/images/sauce-boss";

pub const DEFAULT_IMAGE_URL: &str =
    "https://s3.amazonaws.com/ask-samples-resources/images/sauce-boss/secret-sauce-500x500.png";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ContentError {
    #[error("failed to parse {source_name}: {message}")]
    Parse { source_name: String, message: String },
    #[error("default language {0} has no registered bundle")]
    MissingDefaultLanguage(String),
    #[error("base language {0} has no prompt table")]
    MissingPromptTable(String),
    #[error("base language {0} has no recipes")]
    MissingRecipes(String),
    #[error("locale {locale} is missing prompt {key}")]
    MissingPrompt { locale: String, key: &'static str },
    #[error("regional locale {locale} has no base language bundle {base}")]
    OrphanRegion { locale: String, base: String },
}

/// Keys of the per-locale prompt table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromptKey {
    SkillName,
    HeaderTitle,
    RecipeHeaderTitle,
    HelpHeaderTitle,
    HelpHeaderSubtitle,
    WelcomeMessage,
    WelcomeReprompt,
    DisplayCardTitle,
    HelpMessage,
    HelpReprompt,
    StopMessage,
    RecipeRepeatMessage,
    RecipeNotFoundWithItemName,
    RecipeNotFoundWithoutItemName,
    RecipeNotFoundReprompt,
    ErrorMessage,
    HintTemplate,
}

impl PromptKey {
    pub const ALL: [Self; 17] = [
        Self::SkillName,
        Self::HeaderTitle,
        Self::RecipeHeaderTitle,
        Self::HelpHeaderTitle,
        Self::HelpHeaderSubtitle,
        Self::WelcomeMessage,
        Self::WelcomeReprompt,
        Self::DisplayCardTitle,
        Self::HelpMessage,
        Self::HelpReprompt,
        Self::StopMessage,
        Self::RecipeRepeatMessage,
        Self::RecipeNotFoundWithItemName,
        Self::RecipeNotFoundWithoutItemName,
        Self::RecipeNotFoundReprompt,
        Self::ErrorMessage,
        Self::HintTemplate,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkillName => "SKILL_NAME",
            Self::HeaderTitle => "HEADER_TITLE",
            Self::RecipeHeaderTitle => "RECIPE_HEADER_TITLE",
            Self::HelpHeaderTitle => "HELP_HEADER_TITLE",
            Self::HelpHeaderSubtitle => "HELP_HEADER_SUBTITLE",
            Self::WelcomeMessage => "WELCOME_MESSAGE",
            Self::WelcomeReprompt => "WELCOME_REPROMPT",
            Self::DisplayCardTitle => "DISPLAY_CARD_TITLE",
            Self::HelpMessage => "HELP_MESSAGE",
            Self::HelpReprompt => "HELP_REPROMPT",
            Self::StopMessage => "STOP_MESSAGE",
            Self::RecipeRepeatMessage => "RECIPE_REPEAT_MESSAGE",
            Self::RecipeNotFoundWithItemName => "RECIPE_NOT_FOUND_WITH_ITEM_NAME",
            Self::RecipeNotFoundWithoutItemName => "RECIPE_NOT_FOUND_WITHOUT_ITEM_NAME",
            Self::RecipeNotFoundReprompt => "RECIPE_NOT_FOUND_REPROMPT",
            Self::ErrorMessage => "ERROR_MESSAGE",
            Self::HintTemplate => "HINT_TEMPLATE",
        }
    }
}

/// Prompt table of one resolved locale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prompts {
    locale: String,
    entries: BTreeMap<PromptKey, String>,
}

impl Prompts {
    /// Raw template text for `key`.
    ///
    /// # Errors
    /// Returns [`SkillError::MissingPrompt`] when the key is absent.
    pub fn get(&self, key: PromptKey) -> Result<&str, SkillError> {
        self.entries.get(&key).map(String::as_str).ok_or_else(|| SkillError::MissingPrompt {
            key: key.as_str(),
            locale: self.locale.clone(),
        })
    }

    /// Template text for `key` with every `{name}` placeholder substituted.
    ///
    /// # Errors
    /// Returns [`SkillError::MissingPrompt`] when the key is absent.
    pub fn render(&self, key: PromptKey, args: &[(&str, &str)]) -> Result<String, SkillError> {
        let mut text = self.get(key)?.to_string();
        for (name, value) in args {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        Ok(text)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Recipe text as stored in the content files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeText {
    pub name: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeContent {
    pub id: SauceId,
    pub name: String,
    pub instructions: String,
}

/// Everything localized the skill needs to answer one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocaleBundle {
    pub locale: String,
    pub prompts: Prompts,
    pub recipes: BTreeMap<SauceId, RecipeContent>,
}

impl LocaleBundle {
    #[must_use]
    pub fn recipe(&self, id: SauceId) -> Option<&RecipeContent> {
        self.recipes.get(&id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty() && self.prompts.is_empty()
    }

    /// Uniformly random recipe of this bundle.
    pub fn random_recipe<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&RecipeContent> {
        let candidates = self.recipes.values().collect::<Vec<_>>();
        candidates.choose(rng).copied()
    }

    /// Random recipe other than `excluded`, or any recipe when nothing else exists.
    pub fn random_recipe_excluding<R: Rng + ?Sized>(
        &self,
        excluded: SauceId,
        rng: &mut R,
    ) -> Option<&RecipeContent> {
        let candidates =
            self.recipes.values().filter(|recipe| recipe.id != excluded).collect::<Vec<_>>();
        if candidates.is_empty() {
            return self.random_recipe(rng);
        }
        candidates.choose(rng).copied()
    }
}

/// Screen template documents rendered by capable devices.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenDocuments {
    pub launch: Value,
    pub recipe: Value,
    pub help: Value,
}

impl ScreenDocuments {
    /// Documents compiled into the binary.
    ///
    /// # Errors
    /// Returns [`ContentError::Parse`] when an embedded document is not valid JSON.
    pub fn embedded() -> Result<Self, ContentError> {
        Ok(Self {
            launch: parse_json("launch document", EMBEDDED_LAUNCH_DOCUMENT)?,
            recipe: parse_json("recipe document", EMBEDDED_RECIPE_DOCUMENT)?,
            help: parse_json("help document", EMBEDDED_HELP_DOCUMENT)?,
        })
    }
}

type PromptTables = BTreeMap<String, BTreeMap<PromptKey, String>>;
type RecipeTables = BTreeMap<String, BTreeMap<SauceId, RecipeText>>;

/// Read-only content loaded once per process.
#[derive(Debug, Clone)]
pub struct ContentStore {
    prompts: PromptTables,
    recipes: RecipeTables,
    documents: ScreenDocuments,
    default_language: String,
}

impl ContentStore {
    /// Content compiled into the binary.
    ///
    /// # Errors
    /// Returns a [`ContentError`] when the embedded content fails validation.
    pub fn embedded(default_language: &str) -> Result<Self, ContentError> {
        Self::from_json(EMBEDDED_STRINGS, EMBEDDED_RECIPES, default_language)
    }

    /// Parse and validate prompt and recipe tables keyed by locale tag.
    ///
    /// # Errors
    /// Returns a [`ContentError`] when either table is malformed, the default
    /// language is not registered, a regional table has no base, or a base
    /// language found in either table lacks a full prompt table or any recipe.
    pub fn from_json(
        strings_json: &str,
        recipes_json: &str,
        default_language: &str,
    ) -> Result<Self, ContentError> {
        let prompts: PromptTables = parse_json("prompt table", strings_json)?;
        let recipes: RecipeTables = parse_json("recipe table", recipes_json)?;
        let store = Self {
            prompts,
            recipes,
            documents: ScreenDocuments::embedded()?,
            default_language: default_language.to_ascii_lowercase(),
        };
        store.validate()?;
        Ok(store)
    }

    #[must_use]
    pub fn with_documents(mut self, documents: ScreenDocuments) -> Self {
        self.documents = documents;
        self
    }

    #[must_use]
    pub fn documents(&self) -> &ScreenDocuments {
        &self.documents
    }

    #[must_use]
    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Every locale tag with its own prompt or recipe table.
    #[must_use]
    pub fn locales(&self) -> Vec<String> {
        let mut tags =
            self.prompts.keys().chain(self.recipes.keys()).cloned().collect::<Vec<_>>();
        tags.sort();
        tags.dedup();
        tags
    }

    fn validate(&self) -> Result<(), ContentError> {
        if !self.prompts.contains_key(&self.default_language) {
            return Err(ContentError::MissingDefaultLanguage(self.default_language.clone()));
        }

        let tags = self.prompts.keys().chain(self.recipes.keys());
        let (regional, bases): (Vec<&String>, Vec<&String>) =
            tags.partition(|locale| is_regional(locale));
        let mut bases =
            bases.into_iter().map(|locale| locale.to_ascii_lowercase()).collect::<Vec<_>>();
        bases.sort();
        bases.dedup();

        for locale in regional {
            let base = base_language(locale);
            if !bases.contains(&base) {
                return Err(ContentError::OrphanRegion { locale: locale.clone(), base });
            }
        }

        for locale in &bases {
            let Some(entries) = lookup(&self.prompts, locale) else {
                return Err(ContentError::MissingPromptTable(locale.clone()));
            };
            if let Some(key) = PromptKey::ALL.iter().find(|key| !entries.contains_key(key)) {
                return Err(ContentError::MissingPrompt {
                    locale: locale.clone(),
                    key: key.as_str(),
                });
            }
            let has_recipes =
                lookup(&self.recipes, locale).is_some_and(|recipes| !recipes.is_empty());
            if !has_recipes {
                return Err(ContentError::MissingRecipes(locale.clone()));
            }
        }

        Ok(())
    }

    /// Resolve the bundle for a full locale tag.
    ///
    /// The base language table is taken first and a table registered under the
    /// exact tag replaces individual entries on top of it. An unknown language
    /// yields an empty bundle.
    #[must_use]
    pub fn resolve(&self, locale_tag: &str) -> LocaleBundle {
        let base = base_language(locale_tag);
        let exact = (locale_tag.len() > base.len()).then(|| locale_tag.to_string());

        let mut prompts = lookup(&self.prompts, &base).cloned().unwrap_or_default();
        let mut recipes = lookup(&self.recipes, &base).cloned().unwrap_or_default();
        if let Some(exact) = exact.as_deref() {
            if let Some(overrides) = lookup(&self.prompts, exact) {
                prompts.extend(overrides.iter().map(|(key, text)| (*key, text.clone())));
            }
            if let Some(overrides) = lookup(&self.recipes, exact) {
                recipes.extend(overrides.iter().map(|(id, text)| (*id, text.clone())));
            }
        }

        LocaleBundle {
            locale: locale_tag.to_string(),
            prompts: Prompts { locale: locale_tag.to_string(), entries: prompts },
            recipes: recipes
                .into_iter()
                .map(|(id, text)| {
                    (id, RecipeContent { id, name: text.name, instructions: text.instructions })
                })
                .collect(),
        }
    }

    /// Resolve `locale_tag`, falling back to the default language when the tag is
    /// missing or names an unknown language.
    #[must_use]
    pub fn resolve_or_default(&self, locale_tag: Option<&str>) -> LocaleBundle {
        if let Some(tag) = locale_tag {
            let bundle = self.resolve(tag);
            if !bundle.is_empty() {
                return bundle;
            }
            tracing::warn!(locale = tag, fallback = %self.default_language, "unknown locale");
        }
        self.resolve(&self.default_language)
    }
}

/// Image URL for a sauce code, or the default image for unknown codes.
#[must_use]
pub fn image_for(code: &str) -> String {
    match SauceId::parse(code) {
        Some(id) => sauce_image_url(id),
        None => DEFAULT_IMAGE_URL.to_string(),
    }
}

fn sauce_image_url(id: SauceId) -> String {
    let file = match id {
        SauceId::Barbecue => "barbecue-sauce-500x500.png",
        SauceId::Cranberry => "cranberry-sauce-500x500.png",
        SauceId::HoneyMustard => "honey%20mustard-sauce-500x500.png",
        SauceId::Pesto => "pesto-sauce-500x500.png",
        SauceId::Pizza => "pizza-sauce-500x500.png",
        SauceId::Tartar => "tartar-sauce-500x500.png",
        SauceId::ThousandIsland => "thousand%20island-sauce-500x500.png",
        SauceId::Secret => return DEFAULT_IMAGE_URL.to_string(),
    };
    format!("{IMAGE_BASE_URL}/{file}")
}

fn parse_json<T: serde::de::DeserializeOwned>(
    source_name: &str,
    raw: &str,
) -> Result<T, ContentError> {
    serde_json::from_str(raw).map_err(|err| ContentError::Parse {
        source_name: source_name.to_string(),
        message: err.to_string(),
    })
}

fn base_language(locale_tag: &str) -> String {
    locale_tag.get(..2).unwrap_or(locale_tag).to_ascii_lowercase()
}

fn is_regional(locale_tag: &str) -> bool {
    locale_tag.len() > 2
}

fn lookup<'a, V>(tables: &'a BTreeMap<String, V>, tag: &str) -> Option<&'a V> {
    tables.iter().find(|(key, _)| key.eq_ignore_ascii_case(tag)).map(|(_, value)| value)
}
