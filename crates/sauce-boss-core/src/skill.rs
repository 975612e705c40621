//! Request classification, handler dispatch and the post-response session update.

use rand::Rng;

use crate::compose::{compose_help, compose_launch, compose_recipe, Composed, ScreenData, Surface};
use crate::content::{ContentStore, LocaleBundle, PromptKey, ScreenDocuments};
use crate::envelope::{ApCommand, Directive, HighlightMode, Request, RequestEnvelope, ResponseBody};
use crate::history::{HistoryEntry, RequestKind};
use crate::selection::{extract_selection, SauceSelection, GO_BACK_EVENT, SAUCE_INSTRUCTIONS_EVENT};
use crate::session::SessionState;
use crate::SkillError;

/// Spoken when even the localized apology is unavailable.
pub const FALLBACK_ERROR_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

const RECIPE_INTENT: &str = "RecipeIntent";
const HELP_INTENT: &str = "AMAZON.HelpIntent";
const REPEAT_INTENT: &str = "AMAZON.RepeatIntent";
const PREVIOUS_INTENT: &str = "AMAZON.PreviousIntent";
const CANCEL_INTENT: &str = "AMAZON.CancelIntent";
const STOP_INTENT: &str = "AMAZON.StopIntent";

const RECIPE_TEXT_COMPONENT: &str = "recipeText";

/// Closed set of things an inbound request can ask the skill to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillRequest {
    Launch,
    /// A spoken recipe intent or a recipe tap on the screen.
    Recipe {
        selection: SauceSelection,
        kind: RequestKind,
        arguments: Vec<String>,
    },
    Help,
    Repeat,
    /// `AMAZON.PreviousIntent` or the screen back button.
    Previous,
    Exit,
    SessionEnded {
        reason: Option<String>,
    },
    Unhandled(String),
}

impl SkillRequest {
    #[must_use]
    pub fn classify(request: &Request) -> Self {
        match request {
            Request::Launch(_) => Self::Launch,
            Request::Intent(intent) => match intent.intent.name.as_str() {
                RECIPE_INTENT => Self::Recipe {
                    selection: extract_selection(request),
                    kind: RequestKind::RecipeIntent,
                    arguments: Vec::new(),
                },
                HELP_INTENT => Self::Help,
                REPEAT_INTENT => Self::Repeat,
                PREVIOUS_INTENT => Self::Previous,
                CANCEL_INTENT | STOP_INTENT => Self::Exit,
                other => Self::Unhandled(format!("intent {other}")),
            },
            Request::UserEvent(event) => match event.argument(0).as_deref() {
                Some(SAUCE_INSTRUCTIONS_EVENT) => Self::Recipe {
                    selection: extract_selection(request),
                    kind: RequestKind::ScreenEvent,
                    arguments: event.argument_strings(),
                },
                Some(GO_BACK_EVENT) => Self::Previous,
                Some(other) => Self::Unhandled(format!("screen event {other}")),
                None => Self::Unhandled("screen event without arguments".to_string()),
            },
            Request::SessionEnded(ended) => Self::SessionEnded { reason: ended.reason.clone() },
            Request::Unsupported => Self::Unhandled("unsupported request type".to_string()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Launch => "launch",
            Self::Recipe { .. } => "recipe",
            Self::Help => "help",
            Self::Repeat => "repeat",
            Self::Previous => "previous",
            Self::Exit => "exit",
            Self::SessionEnded { .. } => "session_ended",
            Self::Unhandled(_) => "unhandled",
        }
    }
}

/// Answer one request and update `state` for the next turn.
///
/// Never fails: any handler error is logged and answered with the localized
/// apology. After the response is built the last speech and reprompt are
/// cached for "repeat" and the request is recorded in the actionable history.
pub fn handle_request<R: Rng + ?Sized>(
    envelope: &RequestEnvelope,
    content: &ContentStore,
    state: &mut SessionState,
    rng: &mut R,
) -> ResponseBody {
    let bundle = content.resolve_or_default(envelope.request.locale());
    let request = SkillRequest::classify(&envelope.request);
    let surface =
        Surface { screen: envelope.supports_screen(), new_session: envelope.is_new_session() };
    tracing::debug!(
        request = request.name(),
        locale = %bundle.locale,
        screen = surface.screen,
        "dispatching"
    );

    let mut turn = Turn {
        bundle: &bundle,
        documents: content.documents(),
        surface,
        state: &mut *state,
    };
    let (body, entry) = match turn.dispatch(&request, rng) {
        Ok(answer) => answer,
        Err(err) => {
            tracing::error!(request = request.name(), error = %err, "request handling failed");
            (apology(&bundle), HistoryEntry::passive())
        }
    };

    state.speech = body.output_speech.clone();
    state.reprompt = body.reprompt.clone();
    state.actionable_history.record_if_actionable(entry);
    body
}

struct Turn<'a> {
    bundle: &'a LocaleBundle,
    documents: &'a ScreenDocuments,
    surface: Surface,
    state: &'a mut SessionState,
}

impl Turn<'_> {
    fn dispatch<R: Rng + ?Sized>(
        &mut self,
        request: &SkillRequest,
        rng: &mut R,
    ) -> Result<(ResponseBody, HistoryEntry), SkillError> {
        match request {
            SkillRequest::Launch => Ok((self.launch(rng)?, HistoryEntry::launch())),
            SkillRequest::Recipe { selection, kind, arguments } => {
                let (body, found) = self.recipe(selection, rng)?;
                let entry = match kind {
                    RequestKind::ScreenEvent => {
                        HistoryEntry::screen_event(arguments.clone(), selection.clone())
                    }
                    _ => HistoryEntry::recipe_intent(selection.clone(), found),
                };
                Ok((body, entry))
            }
            SkillRequest::Help => Ok((self.help(rng)?, HistoryEntry::help())),
            SkillRequest::Repeat => Ok((self.repeat()?, HistoryEntry::passive())),
            SkillRequest::Previous => Ok((self.previous(rng)?, HistoryEntry::passive())),
            SkillRequest::Exit => {
                let stop = self.bundle.prompts.get(PromptKey::StopMessage)?;
                Ok((ResponseBody::default().speak(stop).end_session(), HistoryEntry::passive()))
            }
            SkillRequest::SessionEnded { reason } => {
                tracing::info!(reason = reason.as_deref().unwrap_or("unknown"), "session ended");
                Ok((ResponseBody::default(), HistoryEntry::passive()))
            }
            SkillRequest::Unhandled(description) => {
                Err(SkillError::Unhandled(description.clone()))
            }
        }
    }

    fn launch<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ResponseBody, SkillError> {
        let composed = compose_launch(self.bundle, self.surface, rng)?;
        self.spoken(composed)
    }

    fn help<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ResponseBody, SkillError> {
        let composed = compose_help(self.bundle, self.surface, rng)?;
        self.spoken(composed)
    }

    /// Returns the response and whether a recipe was found.
    fn recipe<R: Rng + ?Sized>(
        &mut self,
        selection: &SauceSelection,
        rng: &mut R,
    ) -> Result<(ResponseBody, bool), SkillError> {
        let composed = compose_recipe(selection, self.bundle, self.surface, rng)?;
        let found = composed.recipe.is_some();
        let mut body = ResponseBody::default();
        if let Some(card) = &composed.card {
            body = body.with_card(card.to_card());
        }

        let Some(screen) = &composed.screen else {
            return Ok((body.speak(composed.speech).ask(composed.reprompt), found));
        };

        // The screen speaks the recipe text itself, so keep the words for "repeat".
        let token = screen.token();
        body = body
            .ask(composed.reprompt.as_str())
            .with_directive(self.render(screen)?)
            .with_directive(Directive::ExecuteCommands {
                token: token.to_string(),
                commands: vec![ApCommand::SpeakItem {
                    component_id: RECIPE_TEXT_COMPONENT.to_string(),
                    highlight_mode: HighlightMode::Line,
                }],
            });
        self.state.speak_output = Some(composed.speech);
        self.state.reprompt_output =
            Some(self.bundle.prompts.get(PromptKey::RecipeRepeatMessage)?.to_string());
        Ok((body, found))
    }

    fn repeat(&self) -> Result<ResponseBody, SkillError> {
        if let Some(speech) = &self.state.speech {
            return Ok(ResponseBody {
                output_speech: Some(speech.clone()),
                reprompt: self.state.reprompt.clone(),
                should_end_session: self.state.reprompt.as_ref().map(|_| false),
                ..ResponseBody::default()
            });
        }

        let fallback = self.bundle.prompts.get(PromptKey::RecipeNotFoundReprompt)?;
        match &self.state.speak_output {
            Some(speech) => {
                let reprompt = self.state.reprompt_output.as_deref().unwrap_or(fallback);
                Ok(ResponseBody::default().speak(speech.as_str()).ask(reprompt))
            }
            None => Ok(ResponseBody::default().speak(fallback).ask(fallback)),
        }
    }

    fn previous<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<ResponseBody, SkillError> {
        let target = self.state.actionable_history.find_previous().cloned();
        match target {
            Some(HistoryEntry {
                request_kind: RequestKind::RecipeIntent | RequestKind::ScreenEvent,
                selection,
                ..
            }) => {
                let selection = selection.unwrap_or_default();
                Ok(self.recipe(&selection, rng)?.0)
            }
            Some(HistoryEntry { request_kind: RequestKind::HelpIntent, .. }) => self.help(rng),
            Some(_) | None => self.launch(rng),
        }
    }

    fn spoken(&self, composed: Composed) -> Result<ResponseBody, SkillError> {
        let mut body = ResponseBody::default().speak(composed.speech).ask(composed.reprompt);
        if let Some(screen) = &composed.screen {
            body = body.with_directive(self.render(screen)?);
        }
        Ok(body)
    }

    fn render(&self, screen: &ScreenData) -> Result<Directive, SkillError> {
        let document = match screen {
            ScreenData::Launch(_) => &self.documents.launch,
            ScreenData::Recipe(_) => &self.documents.recipe,
            ScreenData::Help(_) => &self.documents.help,
        };
        Ok(Directive::RenderDocument {
            token: screen.token().to_string(),
            document: document.clone(),
            datasources: screen.datasources()?,
        })
    }
}

fn apology(bundle: &LocaleBundle) -> ResponseBody {
    let message = bundle.prompts.get(PromptKey::ErrorMessage).unwrap_or(FALLBACK_ERROR_MESSAGE);
    ResponseBody::default().speak(message).ask(message)
}
