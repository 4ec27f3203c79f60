//! Storage key names. These match the browser build of the app, so a data
//! directory seeded from a localStorage export loads as-is.

pub const LESSONS: &str = "cremeLessons";
pub const VOCAB: &str = "cremeVocab";
pub const API_KEY: &str = "ai_apiKey";
pub const BASE_URL: &str = "ai_baseUrl";
