//! Expense vocabulary: categories, intents and input methods

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Closed set of spending categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transportation,
    Entertainment,
    Utilities,
    Housing,
    Healthcare,
    Shopping,
    Education,
    Personal,
    Other,
}

impl Category {
    /// All categories in prompt/schema order
    pub const ALL: [Category; 10] = [
        Category::Food,
        Category::Transportation,
        Category::Entertainment,
        Category::Utilities,
        Category::Housing,
        Category::Healthcare,
        Category::Shopping,
        Category::Education,
        Category::Personal,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transportation => "transportation",
            Category::Entertainment => "entertainment",
            Category::Utilities => "utilities",
            Category::Housing => "housing",
            Category::Healthcare => "healthcare",
            Category::Shopping => "shopping",
            Category::Education => "education",
            Category::Personal => "personal",
            Category::Other => "other",
        }
    }

    /// Comma separated list used in prompt text
    pub fn joined() -> String {
        Self::ALL
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category: {}", s)))
    }
}

/// Classified purpose of a user utterance
///
/// Labels outside the known set are kept verbatim in [`Intent::Other`] so they
/// can be reported back; only an explicit `unknown` (or no label) is
/// [`Intent::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Intent {
    AddExpense,
    SetBudget,
    QueryExpenses,
    #[default]
    Unknown,
    Other(String),
}

impl Intent {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "add_expense" | "AddExpense" | "addExpense" => Intent::AddExpense,
            "set_budget" | "SetBudget" | "setBudget" => Intent::SetBudget,
            "query_expenses" | "QueryExpenses" | "queryExpenses" => Intent::QueryExpenses,
            "" | "unknown" | "Unknown" => Intent::Unknown,
            other => Intent::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Intent::AddExpense => "add_expense",
            Intent::SetBudget => "set_budget",
            Intent::QueryExpenses => "query_expenses",
            Intent::Unknown => "unknown",
            Intent::Other(label) => label,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Intent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Intent::from_label(&label))
    }
}

/// How the raw input reached the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    #[default]
    Text,
    /// Transcribed speech
    Voice,
}

impl InputMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputMethod::Text => "text",
            InputMethod::Voice => "voice",
        }
    }
}

impl fmt::Display for InputMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(InputMethod::Text),
            "voice" => Ok(InputMethod::Voice),
            other => Err(Error::InvalidInput(format!(
                "input_method must be 'text' or 'voice', got '{}'",
                other
            ))),
        }
    }
}
