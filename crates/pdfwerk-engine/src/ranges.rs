// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-range parsing: "3", "5-9", "1, 4 7-8" → ordered page numbers.

use std::collections::HashSet;

use pdfwerk_core::error::ValidationError;

/// A single page (`start == end`) or an inclusive span of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub start: u32,
    pub end: u32,
}

impl PageSpan {
    /// Pages covered by the span, in ascending order.
    pub fn pages(&self) -> impl Iterator<Item = u32> + use<> {
        self.start..=self.end
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }
}

/// Split raw tokens on commas and whitespace into spans. `a-b` with `a > b`
/// is swapped. Bounds are not checked here.
pub fn parse_spans<S: AsRef<str>>(raw_tokens: &[S]) -> Result<Vec<PageSpan>, ValidationError> {
    raw_tokens
        .iter()
        .flat_map(|raw| {
            raw.as_ref()
                .split(|ch: char| ch == ',' || ch.is_whitespace())
                .filter(|token| !token.is_empty())
        })
        .map(parse_span)
        .collect()
}

fn parse_span(token: &str) -> Result<PageSpan, ValidationError> {
    let malformed = || ValidationError::MalformedRange {
        token: token.to_string(),
    };
    let number = |part: &str| part.trim().parse::<u32>().map_err(|_| malformed());

    match token.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (number(start)?, number(end)?);
            Ok(PageSpan {
                start: start.min(end),
                end: start.max(end),
            })
        }
        None => {
            let page = number(token)?;
            Ok(PageSpan { start: page, end: page })
        }
    }
}

/// Expand raw tokens into page numbers in input order, dropping later
/// duplicates.
pub fn parse_ranges<S: AsRef<str>>(raw_tokens: &[S]) -> Result<Vec<u32>, ValidationError> {
    let spans = parse_spans(raw_tokens)?;
    let mut seen = HashSet::new();
    Ok(spans
        .iter()
        .flat_map(PageSpan::pages)
        .filter(|page| seen.insert(*page))
        .collect())
}

/// Check every page against `1..=total`, reporting all offenders at once.
pub fn validate_pages(pages: &[u32], total: u32) -> Result<(), ValidationError> {
    if pages.is_empty() {
        return Err(ValidationError::NoPages);
    }
    let mut invalid: Vec<u32> = pages
        .iter()
        .copied()
        .filter(|page| *page < 1 || *page > total)
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    invalid.sort_unstable();
    invalid.dedup();
    Err(ValidationError::PagesOutOfRange { invalid, total })
}
