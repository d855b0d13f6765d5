//! Page-driver implementations.
//!
//! [`HtmlFormDriver`] implements [`crate::page::PageDriver`] over plain HTTP:
//! it fetches the search form, serialises it on submit, and parses the
//! returned HTML. Pages that build their results with client-side script
//! need a browser-backed driver instead.

mod html;
mod parse;

pub use html::{DetailPage, HtmlFormDriver};
