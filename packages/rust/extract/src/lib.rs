//! Article and document text extraction.
//!
//! This crate provides:
//! - [`html`] : text strategies over parsed HTML (readable pass, selector list)
//! - [`network`] : plain HTTP fetch with browser-like headers
//! - [`pdf`] : document download and text extraction
//! - [`Extractor`] : the escalating cascade tying them to the shared browser

pub mod cascade;
pub mod html;
pub mod network;
pub mod pdf;

pub use cascade::Extractor;
pub use html::{
    ARTICLE_SELECTORS, HtmlMethod, ReadableStrategy, SelectorStrategy, StrategyChain,
    TextStrategy, visible_text,
};
pub use pdf::is_pdf_url;
