//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Conference discovery (`ConferenceDiscoverer`)
//! - Talk enumeration (`TalkEnumerator`)
//! - Static content parsing (`ContentParser`)
//! - Footnote rendering (`FootnoteRenderer`)
//! - Per-document extraction (`DocumentExtractor`)

pub mod conferences;
pub mod content;
pub mod extractor;
pub mod footnotes;
pub mod selectors;
pub mod talks;

pub use conferences::{ConferenceDiscoverer, Discovery};
pub use content::{ContentParser, StaticFields};
pub use extractor::{DocumentExtractor, DocumentOutcome};
pub use footnotes::{BrowserRenderer, DisabledRenderer, FootnoteRenderer, renderer_from_config};
pub use talks::TalkEnumerator;
