//! Schema registry
//!
//! Fixed, named JSON contracts shared with the generative backends:
//! - `extraction` - output of the extraction stage
//! - `validation` - output of the validation stage
//! - `add_expense` / `set_budget` - callable action arguments
//!
//! Schemas are static records. They render to JSON Schema on demand so the
//! same definition drives prompt text and what callers may assume about shape.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use crate::{Error, Result};

/// Names of every schema in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaName {
    Extraction,
    Validation,
    AddExpense,
    SetBudget,
}

impl SchemaName {
    pub const ALL: [SchemaName; 4] = [
        SchemaName::Extraction,
        SchemaName::Validation,
        SchemaName::AddExpense,
        SchemaName::SetBudget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaName::Extraction => "extraction",
            SchemaName::Validation => "validation",
            SchemaName::AddExpense => "add_expense",
            SchemaName::SetBudget => "set_budget",
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self, SchemaName::AddExpense | SchemaName::SetBudget)
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "extraction" => Ok(SchemaName::Extraction),
            "validation" => Ok(SchemaName::Validation),
            "add_expense" | "addExpenseAction" => Ok(SchemaName::AddExpense),
            "set_budget" | "setBudgetAction" => Ok(SchemaName::SetBudget),
            _ => Err(Error::SchemaNotFound {
                name: s.to_string(),
                available: SchemaName::ALL
                    .iter()
                    .map(SchemaName::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Primitive or nested type of a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    Number,
    String,
    Boolean,
    StringArray,
    Object(&'static [FieldSpec]),
}

impl FieldType {
    fn json_type(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::StringArray => "array",
            FieldType::Object(_) => "object",
        }
    }
}

/// One field of a schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub description: &'static str,
    pub required: bool,
    /// Rendered as `["<type>", "null"]`
    pub nullable: bool,
    pub enum_values: &'static [&'static str],
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub max_length: Option<u32>,
    pub pattern: Option<&'static str>,
    pub default: Option<&'static str>,
}

const FIELD: FieldSpec = FieldSpec {
    name: "",
    field_type: FieldType::String,
    description: "",
    required: false,
    nullable: false,
    enum_values: &[],
    minimum: None,
    maximum: None,
    max_length: None,
    pattern: None,
    default: None,
};

/// A named contract for one stage output or action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schema {
    pub name: SchemaName,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
}

const EXPENSE_CATEGORIES: &[&str] = &[
    "food",
    "transportation",
    "entertainment",
    "utilities",
    "housing",
    "healthcare",
    "shopping",
    "education",
    "personal",
    "other",
];

const BUDGET_CATEGORIES: &[&str] = &[
    "food",
    "transportation",
    "entertainment",
    "utilities",
    "housing",
    "healthcare",
    "shopping",
    "education",
    "personal",
    "total",
];

const INTENTS: &[&str] = &["add_expense", "set_budget", "query_expenses", "unknown"];

const BUDGET_PERIODS: &[&str] = &["daily", "weekly", "monthly", "yearly"];

static ADD_EXPENSE: Schema = Schema {
    name: SchemaName::AddExpense,
    description: "Add a new expense transaction to the database",
    fields: &[
        FieldSpec {
            name: "amount",
            field_type: FieldType::Number,
            description: "The monetary amount of the expense (positive number)",
            required: true,
            minimum: Some(0.01),
            ..FIELD
        },
        FieldSpec {
            name: "category",
            description: "Category of the expense",
            required: true,
            enum_values: EXPENSE_CATEGORIES,
            ..FIELD
        },
        FieldSpec {
            name: "description",
            description: "Brief description of the expense",
            required: true,
            max_length: Some(500),
            ..FIELD
        },
        FieldSpec {
            name: "date",
            description: "Date of the expense in ISO format (YYYY-MM-DD)",
            required: true,
            pattern: Some(r"^\d{4}-\d{2}-\d{2}$"),
            ..FIELD
        },
    ],
};

static SET_BUDGET: Schema = Schema {
    name: SchemaName::SetBudget,
    description: "Set or update a budget limit for a category",
    fields: &[
        FieldSpec {
            name: "category",
            description: "Category for the budget",
            required: true,
            enum_values: BUDGET_CATEGORIES,
            ..FIELD
        },
        FieldSpec {
            name: "amount",
            field_type: FieldType::Number,
            description: "Budget limit amount (positive number)",
            required: true,
            minimum: Some(0.0),
            ..FIELD
        },
        FieldSpec {
            name: "period",
            description: "Time period for the budget",
            required: true,
            enum_values: BUDGET_PERIODS,
            default: Some("monthly"),
            ..FIELD
        },
    ],
};

static EXTRACTED_DATA_FIELDS: [FieldSpec; 5] = [
    FieldSpec {
        name: "amount",
        field_type: FieldType::Number,
        description: "Extracted monetary amount",
        nullable: true,
        ..FIELD
    },
    FieldSpec {
        name: "category",
        description: "Extracted or inferred category",
        nullable: true,
        ..FIELD
    },
    FieldSpec {
        name: "description",
        description: "Extracted description",
        nullable: true,
        ..FIELD
    },
    FieldSpec {
        name: "date",
        description: "Extracted date in ISO format",
        nullable: true,
        ..FIELD
    },
    FieldSpec {
        name: "confidence",
        field_type: FieldType::Number,
        description: "Confidence score of extraction (0-1)",
        minimum: Some(0.0),
        maximum: Some(1.0),
        ..FIELD
    },
];

static EXTRACTION: Schema = Schema {
    name: SchemaName::Extraction,
    description: "Intent and expense fields extracted from user input",
    fields: &[
        FieldSpec {
            name: "intent",
            description: "The user's intent based on their input",
            required: true,
            enum_values: INTENTS,
            ..FIELD
        },
        FieldSpec {
            name: "extracted_data",
            field_type: FieldType::Object(&EXTRACTED_DATA_FIELDS),
            description: "Data extracted from user input",
            required: true,
            ..FIELD
        },
    ],
};

static VALIDATED_DATA_FIELDS: [FieldSpec; 4] = [
    FieldSpec {
        name: "amount",
        field_type: FieldType::Number,
        description: "Validated amount",
        required: true,
        ..FIELD
    },
    FieldSpec {
        name: "category",
        description: "Normalized category",
        required: true,
        ..FIELD
    },
    FieldSpec {
        name: "description",
        description: "Cleaned description",
        required: true,
        ..FIELD
    },
    FieldSpec {
        name: "date",
        description: "Validated date in YYYY-MM-DD format",
        required: true,
        ..FIELD
    },
];

static SUGGESTION_FIELDS: [FieldSpec; 2] = [
    FieldSpec {
        name: "category",
        description: "Suggested category if current is unclear",
        ..FIELD
    },
    FieldSpec {
        name: "description",
        description: "Suggested improved description",
        ..FIELD
    },
];

static VALIDATION: Schema = Schema {
    name: SchemaName::Validation,
    description: "Validated and normalized expense data",
    fields: &[
        FieldSpec {
            name: "is_valid",
            field_type: FieldType::Boolean,
            description: "Whether the extracted data is valid",
            required: true,
            ..FIELD
        },
        FieldSpec {
            name: "validated_data",
            field_type: FieldType::Object(&VALIDATED_DATA_FIELDS),
            description: "Cleaned and validated data",
            required: true,
            ..FIELD
        },
        FieldSpec {
            name: "errors",
            field_type: FieldType::StringArray,
            description: "List of validation errors (if any)",
            required: true,
            ..FIELD
        },
        FieldSpec {
            name: "suggestions",
            field_type: FieldType::Object(&SUGGESTION_FIELDS),
            description: "Suggested corrections or improvements",
            ..FIELD
        },
    ],
};

/// Look up a schema by name
pub fn get_schema(name: &str) -> Result<&'static Schema> {
    Ok(Schema::get(name.parse()?))
}

/// Callable action schemas only, for function-calling backends
pub fn list_action_schemas() -> Vec<&'static Schema> {
    vec![&ADD_EXPENSE, &SET_BUDGET]
}

impl Schema {
    pub fn get(name: SchemaName) -> &'static Schema {
        match name {
            SchemaName::Extraction => &EXTRACTION,
            SchemaName::Validation => &VALIDATION,
            SchemaName::AddExpense => &ADD_EXPENSE,
            SchemaName::SetBudget => &SET_BUDGET,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the top-level fields, in declaration order
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Render as a JSON Schema object
    pub fn to_json_schema(&self) -> Value {
        object_schema(self.fields)
    }

    /// Render as a `{name, description, parameters}` function definition
    pub fn to_function_definition(&self) -> Value {
        json!({
            "name": self.name.as_str(),
            "description": self.description,
            "parameters": self.to_json_schema(),
        })
    }
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.name.to_string(), field_schema(field));
    }
    let required: Vec<&str> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name)
        .collect();

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

fn field_schema(field: &FieldSpec) -> Value {
    let mut schema = match field.field_type {
        FieldType::Object(children) => object_schema(children),
        FieldType::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        other => json!({ "type": other.json_type() }),
    };

    if field.nullable {
        schema["type"] = json!([field.field_type.json_type(), "null"]);
    }
    schema["description"] = json!(field.description);
    if !field.enum_values.is_empty() {
        schema["enum"] = json!(field.enum_values);
    }
    if let Some(min) = field.minimum {
        schema["minimum"] = json!(min);
    }
    if let Some(max) = field.maximum {
        schema["maximum"] = json!(max);
    }
    if let Some(max_length) = field.max_length {
        schema["maxLength"] = json!(max_length);
    }
    if let Some(pattern) = field.pattern {
        schema["pattern"] = json!(pattern);
    }
    if let Some(default) = field.default {
        schema["default"] = json!(default);
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Intent};

    #[test]
    fn test_get_schema_by_name() {
        assert_eq!(get_schema("extraction").unwrap().name, SchemaName::Extraction);
        assert_eq!(get_schema("validation").unwrap().name, SchemaName::Validation);
        assert_eq!(get_schema("addExpenseAction").unwrap().name, SchemaName::AddExpense);
        assert_eq!(get_schema("set_budget").unwrap().name, SchemaName::SetBudget);
    }

    #[test]
    fn test_schema_not_found() {
        let err = get_schema("delete_expense").unwrap_err();
        match err {
            Error::SchemaNotFound { name, available } => {
                assert_eq!(name, "delete_expense");
                assert!(available.contains("extraction"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_action_schemas_only() {
        let actions = list_action_schemas();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|s| s.name.is_action()));
    }

    #[test]
    fn test_expense_categories_match_category_enum() {
        let names: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
        assert_eq!(EXPENSE_CATEGORIES, names.as_slice());
    }

    #[test]
    fn test_intents_match_intent_enum() {
        for label in INTENTS {
            let intent: Intent = serde_json::from_value(json!(label)).unwrap();
            assert!(!matches!(intent, Intent::Other(_)), "{label} is not a known intent");
            assert_eq!(intent.as_str(), *label);
        }
    }

    #[test]
    fn test_extraction_json_schema() {
        let schema = Schema::get(SchemaName::Extraction).to_json_schema();
        assert_eq!(schema["required"], json!(["intent", "extracted_data"]));
        assert_eq!(schema["properties"]["intent"]["enum"][0], "add_expense");

        let data = &schema["properties"]["extracted_data"];
        assert_eq!(data["type"], "object");
        assert_eq!(data["properties"]["amount"]["type"], json!(["number", "null"]));
        assert_eq!(data["properties"]["confidence"]["maximum"], json!(1.0));
        assert!(data.get("required").is_none());
    }

    #[test]
    fn test_validation_json_schema() {
        let schema = Schema::get(SchemaName::Validation).to_json_schema();
        assert_eq!(schema["required"], json!(["is_valid", "validated_data", "errors"]));
        assert_eq!(schema["properties"]["errors"]["items"]["type"], "string");
        assert_eq!(
            schema["properties"]["validated_data"]["required"],
            json!(["amount", "category", "description", "date"])
        );
    }

    #[test]
    fn test_function_definition() {
        let def = Schema::get(SchemaName::SetBudget).to_function_definition();
        assert_eq!(def["name"], "set_budget");
        assert_eq!(def["parameters"]["properties"]["period"]["default"], "monthly");
        assert_eq!(def["parameters"]["properties"]["category"]["enum"][9], "total");

        let def = Schema::get(SchemaName::AddExpense).to_function_definition();
        assert_eq!(def["parameters"]["properties"]["description"]["maxLength"], 500);
        assert_eq!(def["parameters"]["properties"]["amount"]["minimum"], json!(0.01));
    }
}
