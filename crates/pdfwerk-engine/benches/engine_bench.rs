// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the pure parts of pdfwerk-engine: placement
// geometry and page-range parsing.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use pdfwerk_core::config::WatermarkStyle;
use pdfwerk_core::types::{Anchor, NumberPosition, Rect, WatermarkPosition};
use pdfwerk_engine::geometry::{BoxRatios, layout_page_number, layout_watermark, resolve_rect};
use pdfwerk_engine::parse_ranges;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Every watermark anchor, straight and diagonal, on a US Letter page.
fn bench_watermark_layout(c: &mut Criterion) {
    let page = Rect::from_size(612.0, 792.0);
    let style = WatermarkStyle::default();

    c.bench_function("watermark layout (9 anchors x 2)", |b| {
        b.iter(|| {
            for anchor in Anchor::ALL {
                for diagonal in [false, true] {
                    let position = WatermarkPosition { anchor, diagonal };
                    black_box(layout_watermark(black_box(&page), position, "CONFIDENTIAL", &style));
                }
            }
        });
    });

    c.bench_function("resolve_rect (9 anchors)", |b| {
        b.iter(|| {
            for anchor in Anchor::ALL {
                black_box(resolve_rect(black_box(&page), anchor, BoxRatios::default()));
            }
        });
    });
}

/// Page labels for a 500-page document.
fn bench_page_number_layout(c: &mut Criterion) {
    let page = Rect::from_size(595.0, 842.0);

    c.bench_function("page number layout (500 pages)", |b| {
        b.iter(|| {
            for number in 1..=500u32 {
                let label = format!("Page {number} of 500");
                black_box(layout_page_number(&page, NumberPosition::BottomCenter, &label, 12.0));
            }
        });
    });
}

/// A mixed token list expanding to a few thousand pages.
fn bench_range_parsing(c: &mut Criterion) {
    let tokens: Vec<String> = (0..200)
        .map(|i| match i % 3 {
            0 => format!("{}", i * 7 + 1),
            1 => format!("{}-{}", i * 5, i * 5 + 20),
            _ => format!("{}-{}, {}", i * 9 + 30, i * 9, i),
        })
        .collect();

    c.bench_function("parse_ranges (200 tokens)", |b| {
        b.iter(|| black_box(parse_ranges(black_box(&tokens))));
    });
}

criterion_group!(benches, bench_watermark_layout, bench_page_number_layout, bench_range_parsing);
criterion_main!(benches);
