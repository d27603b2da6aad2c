//! Prompt templates for both pipeline stages
//!
//! Pure functions; the same input always yields the same text.

use chrono::NaiveDate;

use expense_agent_core::ExtractedFields;

/// System and user prompt for one backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

const EXTRACTION_SYSTEM: &str = "You are an expense tracking assistant. Your job is to extract expense information from what the user said.

Extract:
1. Amount: the money spent, as a number (turn spoken or written numbers into digits)
2. Category: exactly one of food, transportation, entertainment, utilities, housing, healthcare, shopping, education, personal, other
3. Description: a short summary of what the money was spent on
4. Date: when the expense happened, as YYYY-MM-DD (use today's date when none is given)

Input may be typed text or transcribed speech, so expect colloquial and informal phrasing.

Examples:
- \"I spent 50 dollars on groceries yesterday\" -> amount: 50, category: food, description: groceries, date: the day before today
- \"Uber to work was fifteen bucks\" -> amount: 15, category: transportation, description: Uber to work, date: today
- \"Movie tickets twenty five\" -> amount: 25, category: entertainment, description: movie tickets, date: today

Classify the intent as add_expense, set_budget, query_expenses or unknown.
Always answer with JSON matching the schema provided.";

const VALIDATION_SYSTEM: &str = "You are a data validation assistant for an expense tracking system.

Your job:
1. Check that the extracted expense data is accurate and plausible
2. Map the category onto one of the standard categories
3. Tidy up the description
4. Make sure the date is a valid YYYY-MM-DD date
5. Make sure the amount is realistic

Standard categories: food, transportation, entertainment, utilities, housing, healthcare, shopping, education, personal, other

When the data is invalid, list every problem in errors. When it is valid, return the cleaned data.
Always answer with JSON matching the schema provided.";

/// Prompt pair for the extraction stage
pub fn build_extraction_prompt(raw_input: &str, today: NaiveDate) -> PromptPair {
    let user = format!(
        "Extract expense information from this input:

User input: \"{input}\"

Today's date: {today}

Extract amount, category, description and date. When something is missing or unclear, make your best guess from context and lower the confidence accordingly.

Respond with valid JSON only.",
        input = raw_input,
        today = today.format("%Y-%m-%d"),
    );

    PromptPair {
        system: EXTRACTION_SYSTEM.to_string(),
        user,
    }
}

/// Prompt pair for the validation stage; absent fields render as `unknown`
pub fn build_validation_prompt(fields: &ExtractedFields, raw_input: &str) -> PromptPair {
    let amount = fields
        .amount
        .map(|a| a.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let user = format!(
        "Validate and clean this extracted expense data:

Extracted data:
- Amount: {amount}
- Category: {category}
- Description: {description}
- Date: {date}

Original input: \"{input}\"

Check that:
1. Amount is a positive number and plausible (neither absurdly large nor small)
2. Category is one of the standard categories
3. Description is clear and concise
4. Date is a valid ISO date (YYYY-MM-DD)

If valid, return the cleaned data. If not, list the errors and offer suggestions.

Respond with valid JSON only.",
        amount = amount,
        category = fields.category.as_deref().unwrap_or("unknown"),
        description = fields.description.as_deref().unwrap_or("unknown"),
        date = fields.date.as_deref().unwrap_or("unknown"),
        input = raw_input,
    );

    PromptPair {
        system: VALIDATION_SYSTEM.to_string(),
        user,
    }
}

/// Single-line categorization prompt; the answer is expected to be one word
pub fn build_categorization_prompt(description: &str) -> String {
    format!(
        "Categorize this expense description into one of these categories:
- food (groceries, restaurants, food delivery, snacks)
- transportation (uber, taxi, gas, parking, public transit)
- entertainment (movies, concerts, games, subscriptions)
- utilities (electricity, water, internet, phone)
- housing (rent, mortgage, repairs, furniture)
- healthcare (doctor, medicine, insurance, pharmacy)
- shopping (clothes, electronics, household items)
- education (books, courses, tuition, supplies)
- personal (haircut, gym, hobbies, gifts)
- other (anything that doesn't fit above)

Description: \"{description}\"

Category:"
    )
}
