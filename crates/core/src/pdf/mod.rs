//! Letter-size PDF rendering of a stored report.
//!
//! Layout is a single top-down cursor: text is wrapped to the printable width and a new page
//! starts whenever the next block wouldn't fit above the bottom margin. Only the built-in
//! Helvetica faces are used, so text is folded to printable ASCII first.

use crate::domain::report::{interpretation_label, Horizon, Report};
use anyhow::Context;
use chrono::{DateTime, Utc};
use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use std::path::{Path, PathBuf};

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 25.4;
const BOTTOM_MARGIN_MM: f32 = 15.0;
const PT_TO_MM: f32 = 0.3528;
// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;

const TITLE_SIZE: f32 = 24.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 10.0;

pub const DEFAULT_MACRO_SUMMARY: &str = "Current macro conditions analyzed include interest rates, inflation, and regulatory developments affecting the crypto market.";

const DISCLAIMER: &str = "This analysis is based on publicly available macro data and structured scoring models. \
Actual market outcomes may differ significantly due to unforeseen events, market sentiment shifts, \
or factors not captured in the model. This report is for informational purposes only and does not \
constitute financial advice. Users should conduct their own research and consult financial advisors \
before making investment decisions.";

#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub pages: usize,
    /// Text lines drawn on each page, in page order.
    pub lines_per_page: Vec<usize>,
}

/// Everything printed besides the report itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub owner_email: &'a str,
    pub macro_summary: &'a str,
    pub generated_at: DateTime<Utc>,
}

pub fn render_report(report: &Report, ctx: RenderContext<'_>) -> anyhow::Result<RenderedPdf> {
    let title = format!("Stratify AI Report - {}", pdf_safe(&report.token_name));
    let mut out = Layout::new(&title)?;

    out.line("STRATIFY AI", TITLE_SIZE, Face::Bold);
    out.line("Global Multi-Factor Influence Intelligence", BODY_SIZE, Face::Regular);
    out.gap(8.0);

    let report_date = ctx.generated_at.format("%B %d, %Y").to_string();
    let confidence = report.confidence.as_str();
    for (label, value) in [
        ("Asset Analyzed:", report.token_name.as_str()),
        ("Report Date:", report_date.as_str()),
        ("Confidence Level:", confidence),
        ("Generated For:", ctx.owner_email),
    ] {
        out.columns(&[(label, Face::Bold, 0.0), (value, Face::Regular, 50.0)], BODY_SIZE);
    }
    out.gap(8.0);

    out.heading("1. Asset Overview");
    out.paragraph(&format!(
        "This report analyzes {} using Stratify AI's multi-factor influence engine. The analysis \
         considers macroeconomic conditions, regulatory developments, and market dynamics to \
         generate probability-based outlooks across multiple time horizons.",
        report.token_name
    ));

    out.heading("2. Current Global Macro Conditions");
    out.paragraph(ctx.macro_summary);

    out.heading("3. Probability Summary");
    out.columns(
        &[
            ("Time Horizon", Face::Bold, 0.0),
            ("Probability Score", Face::Bold, 60.0),
            ("Interpretation", Face::Bold, 105.0),
        ],
        BODY_SIZE,
    );
    for horizon in Horizon::ALL {
        let p = report.probabilities.get(horizon);
        let label = format!("{} ({})", horizon_title(horizon), horizon.range_label());
        let score = format!("{p:.2}");
        out.columns(
            &[
                (label.as_str(), Face::Regular, 0.0),
                (score.as_str(), Face::Regular, 60.0),
                (interpretation_label(p), Face::Regular, 105.0),
            ],
            BODY_SIZE,
        );
    }
    out.gap(4.0);

    for (n, horizon) in (4..).zip(Horizon::ALL) {
        out.heading(&format!(
            "{n}. {} Outlook ({})",
            horizon_title(horizon),
            horizon.range_label()
        ));
        let text = report.narratives.get(horizon);
        out.paragraph(if text.trim().is_empty() {
            "Analysis unavailable"
        } else {
            text
        });
    }

    out.heading("7. Most Likely Scenario");
    out.paragraph(&report.most_likely_scenario);

    out.heading("8. Confidence Level & Limitations");
    out.line(
        &format!("Confidence Level: {confidence}"),
        BODY_SIZE,
        Face::Bold,
    );
    out.gap(2.0);
    out.paragraph(DISCLAIMER);

    out.gap(6.0);
    out.wrapped(
        &format!(
            "Report generated by Stratify AI on {}",
            ctx.generated_at.format("%B %d, %Y at %I:%M %p")
        ),
        BODY_SIZE,
        Face::Italic,
    );

    out.finish()
}

fn horizon_title(horizon: Horizon) -> &'static str {
    match horizon {
        Horizon::Short => "Short-Term",
        Horizon::Medium => "Medium-Term",
        Horizon::Long => "Long-Term",
    }
}

/// `stratify_report_{asset}_{YYYYmmdd_HHMMSS}.pdf`, with anything but `[A-Za-z0-9_-]` in the
/// asset name replaced by `_`.
pub fn report_filename(token_name: &str, at: DateTime<Utc>) -> String {
    let asset: String = token_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "stratify_report_{}_{}.pdf",
        if asset.is_empty() { "asset" } else { &asset },
        at.format("%Y%m%d_%H%M%S")
    )
}

pub async fn write_report_file(dir: &Path, filename: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create report directory {}", dir.display()))?;
    let path = dir.join(filename);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Folds text to printable ASCII: typographic punctuation is transliterated, whitespace runs
/// collapse to a single space, anything else becomes `?`.
pub fn pdf_safe(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            c if c.is_whitespace() => {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            ' '..='~' => out.push(c),
            '\u{2018}' | '\u{2019}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' | '\u{00B7}' => out.push('*'),
            _ => out.push('?'),
        }
    }
    out
}

/// Greedy word wrap by character count. Words longer than a line are hard-split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while let Some((split, _)) = word.char_indices().nth(max_chars) {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let (head, tail) = word.split_at(split);
            lines.push(head.to_string());
            word = tail;
        }
        if word.is_empty() {
            continue;
        }
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Debug, Clone, Copy)]
enum Face {
    Regular,
    Bold,
    Italic,
}

struct Layout {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    y: f32,
    lines_per_page: Vec<usize>,
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.4
}

fn chars_per_line(size: f32) -> usize {
    let usable = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    (usable / (size * PT_TO_MM * AVG_GLYPH_EM)).floor() as usize
}

impl Layout {
    fn new(title: &str) -> anyhow::Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        let font = |f: BuiltinFont| {
            doc.add_builtin_font(f)
                .map_err(|e| anyhow::anyhow!("failed to load builtin font: {e:?}"))
        };
        let regular = font(BuiltinFont::Helvetica)?;
        let bold = font(BuiltinFont::HelveticaBold)?;
        let italic = font(BuiltinFont::HelveticaOblique)?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            italic,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
            lines_per_page: vec![0],
        })
    }

    fn font(&self, face: Face) -> &IndirectFontRef {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
            Face::Italic => &self.italic,
        }
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height >= BOTTOM_MARGIN_MM {
            return;
        }
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        self.lines_per_page.push(0);
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    /// One unwrapped line; the caller keeps it short.
    fn line(&mut self, text: &str, size: f32, face: Face) {
        self.columns(&[(text, face, 0.0)], size);
    }

    /// A row of text cells, each at an x offset from the left margin.
    fn columns(&mut self, cells: &[(&str, Face, f32)], size: f32) {
        let height = line_height(size);
        self.ensure_room(height);
        self.y -= height;
        if let Some(n) = self.lines_per_page.last_mut() {
            *n += 1;
        }
        for (text, face, x) in cells {
            self.layer.use_text(
                pdf_safe(text),
                size,
                Mm(MARGIN_MM + x),
                Mm(self.y),
                self.font(*face),
            );
        }
    }

    fn wrapped(&mut self, text: &str, size: f32, face: Face) {
        for line in wrap_text(&pdf_safe(text), chars_per_line(size)) {
            self.line(&line, size, face);
        }
    }

    fn heading(&mut self, text: &str) {
        // Keep a heading together with at least two body lines.
        self.ensure_room(line_height(HEADING_SIZE) + 2.0 * line_height(BODY_SIZE) + 4.0);
        self.gap(4.0);
        self.line(text, HEADING_SIZE, Face::Bold);
        self.gap(1.5);
    }

    fn paragraph(&mut self, text: &str) {
        self.wrapped(text, BODY_SIZE, Face::Regular);
        self.gap(3.0);
    }

    fn finish(self) -> anyhow::Result<RenderedPdf> {
        let lines_per_page = self.lines_per_page;
        let bytes = self
            .doc
            .save_to_bytes()
            .map_err(|e| anyhow::anyhow!("failed to serialize PDF: {e:?}"))?;
        Ok(RenderedPdf {
            bytes,
            pages: lines_per_page.len(),
            lines_per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::{ConfidenceLevel, HorizonProbabilities, Narratives};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn report(narrative: &str) -> Report {
        Report {
            id: Uuid::nil(),
            owner_id: Uuid::nil(),
            token_name: "Bitcoin".to_string(),
            probabilities: HorizonProbabilities {
                short_term: 0.72,
                medium_term: 0.55,
                long_term: 0.28,
            },
            narratives: Narratives {
                short: narrative.to_string(),
                medium: "Rates are steady \u{2014} a \u{201C}wait and see\u{201D} period.".to_string(),
                long: String::new(),
            },
            most_likely_scenario: "Sideways trading with a mild upward drift.".to_string(),
            confidence: ConfidenceLevel::Medium,
            macro_events_analyzed: 7,
            pdf_path: None,
            created_at: Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap(),
        }
    }

    fn ctx() -> RenderContext<'static> {
        RenderContext {
            owner_email: "analyst@stratify.test",
            macro_summary: DEFAULT_MACRO_SUMMARY,
            generated_at: Utc.with_ymd_and_hms(2026, 10, 16, 14, 30, 5).unwrap(),
        }
    }

    #[test]
    fn renders_a_pdf() {
        let pdf = render_report(&report("Short-term view is positive."), ctx()).unwrap();
        assert!(pdf.bytes.starts_with(b"%PDF"));
        // Eight sections plus the disclaimer run past one letter page.
        assert_eq!(pdf.pages, 2);
        assert_eq!(pdf.lines_per_page.len(), pdf.pages);
        assert!(pdf.lines_per_page.iter().all(|&n| n > 0), "{:?}", pdf.lines_per_page);
    }

    #[test]
    fn long_narratives_spill_onto_more_pages() {
        let long = "Liquidity conditions remain tight while policy signals shift. ".repeat(200);
        let pdf = render_report(&report(&long), ctx()).unwrap();
        assert!(pdf.pages >= 3, "got {} pages", pdf.pages);
        assert!(pdf.lines_per_page.iter().all(|&n| n > 0), "{:?}", pdf.lines_per_page);
    }

    #[test]
    fn filename_is_timestamped_and_path_safe() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 14, 30, 5).unwrap();
        assert_eq!(
            report_filename("Shiba Inu", at),
            "stratify_report_Shiba_Inu_20261016_143005.pdf"
        );
        assert_eq!(
            report_filename("../etc/passwd", at),
            "stratify_report____etc_passwd_20261016_143005.pdf"
        );
    }

    #[test]
    fn pdf_safe_transliterates_typography() {
        assert_eq!(
            pdf_safe("\u{201C}Risk\u{201D} \u{2014} it\u{2019}s up\u{2026}"),
            "\"Risk\" - it's up..."
        );
        assert_eq!(pdf_safe("line\n\n  break"), "line break");
        assert_eq!(pdf_safe("\u{00E9}t\u{00E9} \u{6BD4}"), "?t? ?");
    }

    #[test]
    fn wrap_respects_width_and_splits_long_words() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]);
        assert!(lines.iter().all(|l| l.len() <= 10));

        let lines = wrap_text("abcdefghijklmnop qr", 6);
        assert_eq!(lines, vec!["abcdef", "ghijkl", "mnop", "qr"]);
        assert!(wrap_text("   ", 10).is_empty());
    }

    #[tokio::test]
    async fn report_file_lands_in_output_dir() {
        let dir = std::env::temp_dir().join(format!("stratify-pdf-test-{}", Uuid::new_v4()));
        let path = write_report_file(&dir, "r.pdf", b"%PDF-1.3").await.unwrap();
        assert_eq!(path, dir.join("r.pdf"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.3");
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
