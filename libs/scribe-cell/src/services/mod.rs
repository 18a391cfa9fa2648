pub mod gemini;
pub mod notes;

pub use gemini::GeminiScribe;
pub use notes::SoapNoteService;
