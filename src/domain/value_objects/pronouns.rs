//! Pronoun categories and their grammatical forms

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::StoryError;

/// Closed set of pronoun categories with built-in forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PronounCategory {
    Male,
    Female,
    Neutral,
}

impl PronounCategory {
    pub const ALL: [PronounCategory; 3] = [Self::Male, Self::Female, Self::Neutral];
}

impl std::fmt::Display for PronounCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Neutral => "neutral",
        };
        f.write_str(label)
    }
}

impl FromStr for PronounCategory {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "he" | "him" | "he/him" => Ok(Self::Male),
            "female" | "she" | "her" | "she/her" => Ok(Self::Female),
            "neutral" | "they" | "them" | "they/them" => Ok(Self::Neutral),
            other => Err(StoryError::Configuration(format!(
                "unknown pronoun category: {:?}",
                other
            ))),
        }
    }
}

/// One grammatical slot of a pronoun set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PronounForm {
    Subject,
    Object,
    PossessiveAdjective,
    PossessivePronoun,
    Reflexive,
}

/// Fully resolved pronoun forms for one character
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PronounSet {
    /// he / she / they
    pub subject: String,
    /// him / her / them
    pub object: String,
    /// his / her / their (book)
    pub possessive_adjective: String,
    /// (the book is) his / hers / theirs
    pub possessive_pronoun: String,
    /// himself / herself / themselves
    pub reflexive: String,
}

impl PronounSet {
    /// Look up the fixed forms for a category
    pub fn resolve(category: PronounCategory) -> Self {
        let forms = match category {
            PronounCategory::Male => ["he", "him", "his", "his", "himself"],
            PronounCategory::Female => ["she", "her", "her", "hers", "herself"],
            PronounCategory::Neutral => ["they", "them", "their", "theirs", "themselves"],
        };
        Self::from_forms(forms)
    }

    /// Author-supplied forms, bypassing category lookup
    pub fn custom(
        subject: impl Into<String>,
        object: impl Into<String>,
        possessive_adjective: impl Into<String>,
        possessive_pronoun: impl Into<String>,
        reflexive: impl Into<String>,
    ) -> Result<Self, StoryError> {
        let set = Self {
            subject: subject.into(),
            object: object.into(),
            possessive_adjective: possessive_adjective.into(),
            possessive_pronoun: possessive_pronoun.into(),
            reflexive: reflexive.into(),
        };
        let forms = [
            &set.subject,
            &set.object,
            &set.possessive_adjective,
            &set.possessive_pronoun,
            &set.reflexive,
        ];
        if forms.iter().any(|f| f.trim().is_empty()) {
            return Err(StoryError::Configuration(
                "custom pronoun sets need all five forms".to_string(),
            ));
        }
        Ok(set)
    }

    fn from_forms(forms: [&str; 5]) -> Self {
        Self {
            subject: forms[0].to_string(),
            object: forms[1].to_string(),
            possessive_adjective: forms[2].to_string(),
            possessive_pronoun: forms[3].to_string(),
            reflexive: forms[4].to_string(),
        }
    }

    pub fn form(&self, form: PronounForm) -> &str {
        match form {
            PronounForm::Subject => &self.subject,
            PronounForm::Object => &self.object,
            PronounForm::PossessiveAdjective => &self.possessive_adjective,
            PronounForm::PossessivePronoun => &self.possessive_pronoun,
            PronounForm::Reflexive => &self.reflexive,
        }
    }

    /// The category whose forms match exactly, if any
    pub fn category(&self) -> Option<PronounCategory> {
        PronounCategory::ALL
            .into_iter()
            .find(|c| &Self::resolve(*c) == self)
    }
}

impl std::fmt::Display for PronounSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subject, self.object, self.possessive_adjective
        )
    }
}

/// How a character's pronouns are chosen at creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PronounSpec {
    Category(PronounCategory),
    Custom(PronounSet),
}

impl PronounSpec {
    pub fn into_set(self) -> PronounSet {
        match self {
            Self::Category(category) => PronounSet::resolve(category),
            Self::Custom(set) => set,
        }
    }
}

impl From<PronounCategory> for PronounSpec {
    fn from(category: PronounCategory) -> Self {
        Self::Category(category)
    }
}
