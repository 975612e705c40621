//! Speech, card and screen datasource composition for each kind of answer.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{image_for, LocaleBundle, PromptKey, RecipeContent};
use crate::envelope::{Card, CardImage};
use crate::selection::SauceSelection;
use crate::{SauceId, SkillError};

/// Sauces shown on the launch and help screens, in display order.
pub const DISPLAYED_SAUCES: [SauceId; 8] = SauceId::ALL;

const DATASOURCE_KEY: &str = "sauceBossData";

/// Presentation capabilities of the requesting device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Surface {
    pub screen: bool,
    pub new_session: bool,
}

impl Surface {
    fn back_button(self) -> bool {
        !self.new_session
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardContent {
    pub title: String,
    pub text: String,
    pub image_url: String,
}

impl CardContent {
    #[must_use]
    pub fn to_card(&self) -> Card {
        Card::Standard {
            title: self.title.clone(),
            text: self.text.clone(),
            image: Some(CardImage {
                small_image_url: self.image_url.clone(),
                large_image_url: self.image_url.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transformer {
    pub input_path: String,
    pub transformer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

impl Transformer {
    fn ssml_to_speech(input_path: &str, output_name: &str) -> Self {
        Self {
            input_path: input_path.to_string(),
            transformer: "ssmlToSpeech".to_string(),
            output_name: Some(output_name.to_string()),
        }
    }

    fn text_to_hint(input_path: &str) -> Self {
        Self {
            input_path: input_path.to_string(),
            transformer: "textToHint".to_string(),
            output_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchItem {
    pub id: String,
    pub image: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchScreen {
    pub header_title: String,
    pub hint_text: String,
    pub items: Vec<LaunchItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeScreen {
    pub header_title: String,
    pub header_back_button: bool,
    pub hint_text: String,
    pub sauce_img: String,
    pub sauce_text: String,
    pub sauce_ssml: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HelpItem {
    pub id: String,
    pub primary_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HelpScreen {
    pub header_title: String,
    pub header_subtitle: String,
    pub header_back_button: bool,
    pub items: Vec<HelpItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenData {
    Launch(LaunchScreen),
    Recipe(RecipeScreen),
    Help(HelpScreen),
}

#[derive(Serialize)]
struct ObjectData<'a, P: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: &'a P,
    transformers: Vec<Transformer>,
}

impl ScreenData {
    /// Directive token identifying the rendered document.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            Self::Launch(_) => "launchToken",
            Self::Recipe(_) => "sauce-boss",
            Self::Help(_) => "helpScreen",
        }
    }

    /// Datasource object handed to the screen document.
    ///
    /// # Errors
    /// Returns [`SkillError::Template`] when the datasource cannot be encoded.
    pub fn datasources(&self) -> Result<Value, SkillError> {
        let data = match self {
            Self::Launch(screen) => to_value(&ObjectData {
                kind: "object",
                properties: screen,
                transformers: vec![Transformer::text_to_hint("hintText")],
            })?,
            Self::Recipe(screen) => to_value(&ObjectData {
                kind: "object",
                properties: screen,
                transformers: vec![
                    Transformer::ssml_to_speech("sauceSsml", "sauceSpeech"),
                    Transformer::text_to_hint("hintText"),
                ],
            })?,
            Self::Help(screen) => to_value(screen)?,
        };
        let mut root = serde_json::Map::new();
        root.insert(DATASOURCE_KEY.to_string(), data);
        Ok(Value::Object(root))
    }
}

/// A composed answer before it is shaped into a platform response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    pub speech: String,
    pub reprompt: String,
    pub card: Option<CardContent>,
    pub screen: Option<ScreenData>,
    /// The recipe that was found, if any.
    pub recipe: Option<RecipeContent>,
}

/// Compose the answer to a recipe request.
///
/// # Errors
/// Returns a [`SkillError`] when a prompt is missing from the bundle or the
/// screen datasource cannot be built.
pub fn compose_recipe<R: Rng + ?Sized>(
    selection: &SauceSelection,
    bundle: &LocaleBundle,
    surface: Surface,
    rng: &mut R,
) -> Result<Composed, SkillError> {
    let prompts = &bundle.prompts;
    let reprompt = prompts.get(PromptKey::RecipeNotFoundReprompt)?.to_string();

    let Some(recipe) = selection.id.and_then(|id| bundle.recipe(id)) else {
        let speech = match selection.spoken_value.as_deref() {
            Some(spoken) => {
                prompts.render(PromptKey::RecipeNotFoundWithItemName, &[("sauce", spoken)])?
            }
            None => prompts.get(PromptKey::RecipeNotFoundWithoutItemName)?.to_string(),
        };
        return Ok(Composed { speech, reprompt, card: None, screen: None, recipe: None });
    };

    let skill_name = prompts.get(PromptKey::SkillName)?;
    let image = image_for(recipe.id.as_str());
    let card = CardContent {
        title: prompts.render(
            PromptKey::DisplayCardTitle,
            &[("skill_name", skill_name), ("sauce", &recipe.name)],
        )?,
        text: recipe.instructions.clone(),
        image_url: image.clone(),
    };

    let screen = if surface.screen {
        let hint_recipe = bundle.random_recipe_excluding(recipe.id, rng).unwrap_or(recipe);
        Some(ScreenData::Recipe(RecipeScreen {
            header_title: prompts.render(PromptKey::RecipeHeaderTitle, &[("sauce", &recipe.name)])?,
            header_back_button: surface.back_button(),
            hint_text: prompts.render(PromptKey::HintTemplate, &[("sauce", &hint_recipe.name)])?,
            sauce_img: image,
            sauce_text: recipe.instructions.clone(),
            sauce_ssml: format!("<speak>{}</speak>", escape_ssml(&recipe.instructions)),
        }))
    } else {
        None
    };

    Ok(Composed {
        speech: format!("{} {reprompt}", recipe.instructions),
        reprompt,
        card: Some(card),
        screen,
        recipe: Some(recipe.clone()),
    })
}

/// Compose the welcome answer.
///
/// # Errors
/// Returns a [`SkillError`] when the bundle has no recipes or lacks a prompt.
pub fn compose_launch<R: Rng + ?Sized>(
    bundle: &LocaleBundle,
    surface: Surface,
    rng: &mut R,
) -> Result<Composed, SkillError> {
    let prompts = &bundle.prompts;
    let skill_name = prompts.get(PromptKey::SkillName)?;
    let suggestion = pick_recipe(bundle, rng)?;
    let speech = prompts.render(
        PromptKey::WelcomeMessage,
        &[("skill_name", skill_name), ("sauce", &suggestion.name)],
    )?;
    let reprompt = prompts.get(PromptKey::WelcomeReprompt)?.to_string();

    let screen = if surface.screen {
        let hint = pick_recipe(bundle, rng)?;
        Some(ScreenData::Launch(LaunchScreen {
            header_title: prompts.render(PromptKey::HeaderTitle, &[("skill_name", skill_name)])?,
            hint_text: prompts.render(PromptKey::HintTemplate, &[("sauce", &hint.name)])?,
            items: displayed_recipes(bundle)
                .map(|recipe| LaunchItem {
                    id: recipe.id.as_str().to_string(),
                    image: image_for(recipe.id.as_str()),
                    text: recipe.name.clone(),
                })
                .collect(),
        }))
    } else {
        None
    };

    Ok(Composed { speech, reprompt, card: None, screen, recipe: None })
}

/// Compose the help answer.
///
/// # Errors
/// Returns a [`SkillError`] when the bundle has no recipes or lacks a prompt.
pub fn compose_help<R: Rng + ?Sized>(
    bundle: &LocaleBundle,
    surface: Surface,
    rng: &mut R,
) -> Result<Composed, SkillError> {
    let prompts = &bundle.prompts;
    let suggestion = pick_recipe(bundle, rng)?;
    let speech = prompts.render(PromptKey::HelpMessage, &[("sauce", &suggestion.name)])?;
    let reprompt = prompts.render(PromptKey::HelpReprompt, &[("sauce", &suggestion.name)])?;

    let screen = if surface.screen {
        let items = displayed_recipes(bundle)
            .map(|recipe| {
                Ok(HelpItem {
                    id: recipe.id.as_str().to_string(),
                    primary_text: prompts
                        .render(PromptKey::HintTemplate, &[("sauce", &recipe.name)])?,
                })
            })
            .collect::<Result<Vec<_>, SkillError>>()?;
        Some(ScreenData::Help(HelpScreen {
            header_title: prompts.get(PromptKey::HelpHeaderTitle)?.to_string(),
            header_subtitle: prompts.get(PromptKey::HelpHeaderSubtitle)?.to_string(),
            header_back_button: surface.back_button(),
            items,
        }))
    } else {
        None
    };

    Ok(Composed { speech, reprompt, card: None, screen, recipe: None })
}

fn pick_recipe<'a, R: Rng + ?Sized>(
    bundle: &'a LocaleBundle,
    rng: &mut R,
) -> Result<&'a RecipeContent, SkillError> {
    bundle
        .random_recipe(rng)
        .ok_or_else(|| SkillError::Template(format!("locale {} has no recipes", bundle.locale)))
}

fn displayed_recipes(bundle: &LocaleBundle) -> impl Iterator<Item = &RecipeContent> {
    DISPLAYED_SAUCES.iter().filter_map(|id| bundle.recipe(*id))
}

fn escape_ssml(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, SkillError> {
    serde_json::to_value(value).map_err(|err| SkillError::Template(err.to_string()))
}
