//! Three-level model selection menu: family, model, confirmation

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::connector::{Button, Keyboard};
use crate::controller::ChoiceToken;
use crate::domain::Session;
use crate::store::{SessionRepo, StoreError};

pub const FAMILY_PROMPT: &str = "Выберите тип модели:";

pub const MODEL_PROMPT: &str = "Выберите модель:";

const BACK_LABEL: &str = "« Назад";

const ANALYZE_LABEL: &str = "Начать анализ поста";

#[derive(Debug, Error)]
pub enum MenuError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MenuError {
    pub fn user_message(&self) -> String {
        match self {
            MenuError::Config(e) => e.user_message(),
            MenuError::Store(e) => e.user_message(),
        }
    }
}

/// Confirmation text after a model change
pub fn confirmation_text(model: &str) -> String {
    format!("Модель изменена на {}. Выберите действие:", model)
}

pub struct ModelMenu {
    config: Arc<Config>,
    repo: SessionRepo,
}

impl ModelMenu {
    pub fn new(config: Arc<Config>, repo: SessionRepo) -> Self {
        Self { config, repo }
    }

    /// Level one: provider families in configured order
    pub fn families_keyboard(&self) -> Keyboard {
        Keyboard::new(
            self.config
                .providers
                .iter()
                .map(|p| Button::new(&p.name, ChoiceToken::Family(p.name.clone()).to_string()))
                .collect(),
        )
    }

    /// Level two: models of one family plus a way back
    pub fn models_keyboard(&self, family: &str) -> Result<Keyboard, ConfigError> {
        debug!(%family, "models_keyboard: called");
        let provider = self.config.provider(family)?;
        let mut buttons: Vec<Button> = provider
            .models
            .iter()
            .map(|m| {
                let token = ChoiceToken::Model {
                    family: provider.name.clone(),
                    model: m.clone(),
                };
                Button::new(m, token.to_string())
            })
            .collect();
        buttons.push(Button::new(BACK_LABEL, ChoiceToken::BackToFamilies.to_string()));
        Ok(Keyboard::new(buttons))
    }

    /// Level three: start analysis or go back to the family's models
    pub fn actions_keyboard(&self, family: &str) -> Keyboard {
        Keyboard::new(vec![
            Button::new(ANALYZE_LABEL, ChoiceToken::Analyze.to_string()),
            Button::new(BACK_LABEL, ChoiceToken::BackToModels(family.to_string()).to_string()),
        ])
    }

    /// Switch the session to a model of a family
    ///
    /// Returns whether anything changed; reselecting the current model writes
    /// nothing. An unknown family or a model outside the family leaves the
    /// session untouched.
    pub async fn select_model(&self, session: &mut Session, family: &str, model: &str) -> Result<bool, MenuError> {
        debug!(user_id = %session.user_id, %family, %model, "select_model: called");
        let selection = self.config.selection(family, model)?;
        if session.model_selection == selection {
            debug!("select_model: already selected");
            return Ok(false);
        }

        self.repo.commit(session, move |s| s.model_selection = selection).await?;
        info!(user_id = %session.user_id, %family, %model, "Model changed");
        Ok(true)
    }
}
