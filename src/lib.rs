//! Allergen Relay - HTTP backend that turns bakery recipes into EU allergen labels.
//!
//! Features:
//! - Single `/analyze` endpoint relaying recipe text or images to an
//!   OpenAI-compatible chat-completions API
//! - Fixed allergen classification prompt (EU Regulation 1169/2011)
//! - Server-side extraction of TXT, DOCX, XLSX, PDF and image uploads
//! - Printable label export (Markdown, PDF, DOCX)

pub mod analysis;
pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod http;
pub mod labels;
pub mod logger;
pub mod prompt;
pub mod upstream;
