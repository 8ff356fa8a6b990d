// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Blattwerk.
//
// Expected domain failures (wrong password, bad page range, malformed
// selector) are dedicated variants so that callers can branch on them;
// library-level faults are wrapped with a human-readable message.

use thiserror::Error;

/// Top-level error type for all Blattwerk operations.
#[derive(Debug, Error)]
pub enum BlattwerkError {
    // -- Document errors --
    #[error("not a valid PDF: {0}")]
    Format(String),

    #[error("document is encrypted and no password was supplied")]
    PasswordRequired,

    #[error("wrong password: {0}")]
    Authentication(String),

    #[error("page range {start}-{end} invalid for {total} page document")]
    PageRange { start: u32, end: u32, total: u32 },

    #[error("invalid page selector: {0}")]
    Selector(String),

    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("image processing failed: {0}")]
    Image(String),

    // -- Conversion errors --
    #[error("conversion failed: {0}")]
    Convert(String),

    #[error("fetch timed out: {0}")]
    Timeout(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    // -- Session / storage --
    #[error("session error: {0}")]
    Session(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlattwerkError>;
