// src/specs/mod.rs
//! # Scraping “specs” module
//!
//! Page-specific readers for EDGAR. Each spec knows *where the data lives* in one
//! kind of page and how to pull it out tolerantly with `core::html` helpers.
//!
//! ## What lives here
//! - **Pure parsing** of fetched bodies: issuer directory listings, filing package
//!   listings, filing indexes, Form 4 XML documents.
//! - **Selector choice** (table `summary` / `class` attributes, cell positions).
//!
//! ## What does **not** live here
//! - Requests, throttling and pacing (`core::retry`, `pacing`, `scrape`).
//! - Persistence and dedup (`store`, `merge`).
//!
//! ## Typical call chain
//! ```text
//! runner → scrape::discover      → specs::listing
//!        → scrape::fetch_filings → specs::filing → specs::form4
//! ```
//!
//! ## Conventions
//! - Case-insensitive tag detection, local scanning inside the selected table.
//! - Missing pieces are `None` / empty, never errors; callers decide what that means.
pub mod filing;
pub mod form4;
pub mod listing;
