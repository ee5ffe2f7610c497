// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — lopdf helpers, page copying, and the two ways of stamping text
// onto existing pages.

pub mod copy;
pub mod document;
pub mod overlay;
pub mod stamp;

pub use copy::{PageCopier, copy_pages};
pub use overlay::OverlayMerger;
pub use stamp::{InkStyle, TextStamper};
