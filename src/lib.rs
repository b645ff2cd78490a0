pub mod canonicalizer;
pub mod classifier;
pub mod config;
pub mod entities;
pub mod importer;
pub mod jobs;
pub mod llm;
pub mod repositories;
pub mod sanitizer;
pub mod scraper;
pub mod service;
pub mod synopsis;
pub mod tagging;
