// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-session — Session-scoped file storage for the Blattwerk workbench.
//
// Each session owns exactly one workspace directory holding uploaded inputs
// and produced outputs. Nothing persists beyond the session lifetime: an
// age-based sweep removes stale workspaces.

pub mod session;
pub mod sweep;
pub mod workspace;

pub use session::{Session, SessionStore};
pub use workspace::{UploadedFile, Workspace};
