//! Renders a recipe as a paginated PDF. Section order and styling follow
//! the printed layout users already know: centered title, italic metadata,
//! then Ingredients, Instructions, Variations and Notes under grey header
//! bands. Output is deterministic for a given recipe snapshot.

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb,
};

use crate::error::{AppError, AppResult};
use crate::recipes::repo::Recipe;

const PAGE_W: f64 = 210.0;
const PAGE_H: f64 = 297.0;
const MARGIN: f64 = 20.0;
const BODY_LINE_H: f64 = 6.0;

const TITLE_COLOR: (f64, f64, f64) = (255.0 / 255.0, 71.0 / 255.0, 32.0 / 255.0);
const BAND_COLOR: (f64, f64, f64) = (240.0 / 255.0, 240.0 / 255.0, 240.0 / 255.0);

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    y: f64,
}

impl PageWriter {
    fn new(title: &str) -> Self {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        Self {
            doc,
            layer,
            y: PAGE_H - MARGIN,
        }
    }

    fn ensure_space(&mut self, needed: f64) {
        if self.y - needed < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_H - MARGIN;
        }
    }

    fn set_color(&self, (r, g, b): (f64, f64, f64)) {
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }

    fn text(&mut self, text: &str, size: f64, x: f64, font: &IndirectFontRef) {
        self.ensure_space(BODY_LINE_H);
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    /// Grey section header band with a bold label.
    fn header_band(&mut self, label: &str, font: &IndirectFontRef) {
        const BAND_H: f64 = 8.0;
        self.ensure_space(BAND_H + BODY_LINE_H);
        let top = self.y + BODY_LINE_H - 1.0;
        let bottom = top - BAND_H;
        let band = Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(top)), false),
                (Point::new(Mm(PAGE_W - MARGIN), Mm(top)), false),
                (Point::new(Mm(PAGE_W - MARGIN), Mm(bottom)), false),
                (Point::new(Mm(MARGIN), Mm(bottom)), false),
            ],
            is_closed: true,
            has_fill: true,
            has_stroke: false,
            is_clipping_path: false,
        };
        self.set_color(BAND_COLOR);
        self.layer.add_shape(band);
        self.set_color((0.0, 0.0, 0.0));
        self.layer
            .use_text(label, 12.0, Mm(MARGIN + 1.0), Mm(bottom + 2.5), font);
        self.y = bottom - BODY_LINE_H;
    }

    /// Wrapped body paragraph at 10pt. Blank input still consumes one line,
    /// mirroring an empty multi-cell.
    fn body(&mut self, text: &str, font: &IndirectFontRef) {
        for line in wrap_text(text, body_chars_per_line()) {
            self.text(&line, 10.0, MARGIN, font);
            self.y -= BODY_LINE_H;
        }
        self.y -= 4.0;
    }
}

/// Approximate character budget for one wrapped line of 10pt Helvetica
/// across the printable width. An estimate is fine: wrapping only has to be
/// deterministic and stay inside the margins.
fn body_chars_per_line() -> usize {
    const PT_TO_MM: f64 = 0.352_778;
    const AVG_GLYPH_FRACTION: f64 = 0.5;
    let usable = PAGE_W - 2.0 * MARGIN;
    (usable / (10.0 * AVG_GLYPH_FRACTION * PT_TO_MM)) as usize
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        if raw.chars().count() <= width {
            lines.push(raw.to_string());
            continue;
        }
        let mut current = String::new();
        let mut current_len = 0usize;
        for word in raw.split(' ') {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            // A single word longer than the line is hard-broken.
            if word_len > width {
                for ch in word.chars() {
                    if current_len == width {
                        lines.push(std::mem::take(&mut current));
                        current_len = 0;
                    }
                    current.push(ch);
                    current_len += 1;
                }
            } else {
                current.push_str(word);
                current_len += word_len;
            }
        }
        lines.push(current);
    }
    lines
}

/// The built-in Helvetica fonts carry a single-byte WinAnsi encoding.
/// Anything outside it is substituted with `?` instead of failing the
/// whole export.
fn to_winansi(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c } else { '?' })
        .collect()
}

/// Filesystem-safe form of the title: alphanumerics, dot, underscore and
/// hyphen survive, whitespace runs become a single underscore, everything
/// else is dropped.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::new();
    let mut pending_sep = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else if c.is_whitespace() {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        out.push_str("recipe");
    }
    out
}

pub fn download_name(title: &str, date: &str) -> String {
    format!("{}_{}.pdf", sanitize_title(title), date)
}

pub fn render_pdf(recipe: &Recipe) -> AppResult<Vec<u8>> {
    let mut page = PageWriter::new(&to_winansi(&recipe.title));
    let fonts = Fonts {
        regular: add_font(&page.doc, BuiltinFont::Helvetica)?,
        bold: add_font(&page.doc, BuiltinFont::HelveticaBold)?,
        italic: add_font(&page.doc, BuiltinFont::HelveticaOblique)?,
    };

    // Centered title in the accent color.
    let title = to_winansi(&recipe.title);
    let title_x = (PAGE_W - title.chars().count() as f64 * 14.0 * 0.5 * 0.352_778) / 2.0;
    page.set_color(TITLE_COLOR);
    page.text(&title, 14.0, title_x.max(MARGIN), &fonts.bold);
    page.y -= 12.0;
    page.set_color((0.0, 0.0, 0.0));

    let author = recipe.author.as_deref().unwrap_or_default();
    for line in [
        format!("Author: {}", to_winansi(author)),
        format!("Date: {}", to_winansi(&recipe.date)),
        format!("Prep Time: {} minutes", recipe.prep_time),
        format!("Cook Time: {} minutes", recipe.cook_time),
    ] {
        page.text(&line, 12.0, MARGIN, &fonts.italic);
        page.y -= 8.0;
    }
    page.y -= 4.0;

    let sections: [(&str, &str); 4] = [
        ("Ingredients:", &recipe.ingredients),
        ("Instructions:", &recipe.instructions),
        ("Variations:", recipe.variations.as_deref().unwrap_or_default()),
        ("Notes:", recipe.notes.as_deref().unwrap_or_default()),
    ];
    for (label, text) in sections {
        page.header_band(label, &fonts.bold);
        page.body(&to_winansi(text), &fonts.regular);
    }

    page.doc
        .save_to_bytes()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("pdf serialization: {e}")))
}

fn add_font(doc: &PdfDocumentReference, font: BuiltinFont) -> AppResult<IndirectFontRef> {
    doc.add_builtin_font(font)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("pdf font: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe() -> Recipe {
        Recipe {
            id: 1,
            title: "Tomato Soup".into(),
            author: Some("Pat".into()),
            date: "2026-08-30".into(),
            prep_time: 10,
            cook_time: 20,
            ingredients: "tomato,basil,salt".into(),
            instructions: "Simmer.".into(),
            variations: None,
            notes: None,
        }
    }

    #[test]
    fn renders_a_pdf_byte_stream() {
        let bytes = render_pdf(&recipe()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_optional_fields_do_not_fail() {
        let mut r = recipe();
        r.author = None;
        r.variations = None;
        r.notes = None;
        assert!(render_pdf(&r).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn non_latin1_text_is_substituted_not_fatal() {
        let mut r = recipe();
        r.title = "Pho 🍜 Bò".into();
        r.instructions = "Add 大葱 and simmer".into();
        assert!(render_pdf(&r).unwrap().starts_with(b"%PDF"));
        assert_eq!(to_winansi("Pho 🍜 Bò"), "Pho ? Bò");
    }

    #[test]
    fn long_instructions_paginate() {
        let mut r = recipe();
        r.instructions = "Stir thoroughly and wait. ".repeat(400);
        assert!(render_pdf(&r).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 9));

        let lines = wrap_text("abcdefghijkl", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "kl"]);

        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn title_sanitization() {
        assert_eq!(sanitize_title("Tomato Soup"), "Tomato_Soup");
        assert_eq!(sanitize_title("Mom's best pie!"), "Moms_best_pie");
        assert_eq!(sanitize_title("  spaced   out  "), "spaced_out");
        assert_eq!(sanitize_title("安全"), "recipe");
        assert_eq!(
            download_name("Tomato Soup", "2026-08-30"),
            "Tomato_Soup_2026-08-30.pdf"
        );
    }
}
