//! Minimal multi-page PDF writer built on lopdf's object model.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 54;
const LINE_HEIGHT: i64 = 13;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT) as usize;

/// Characters per line for 10pt Courier inside the margins.
pub const TEXT_COLUMNS: usize = 84;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfLine {
    Title(String),
    Heading(String),
    Text(String),
    Blank,
}

impl PdfLine {
    fn font(&self) -> (&'static str, u8) {
        match self {
            PdfLine::Title(_) => ("F2", 16),
            PdfLine::Heading(_) => ("F2", 11),
            PdfLine::Text(_) | PdfLine::Blank => ("F1", 10),
        }
    }

    fn text(&self) -> &str {
        match self {
            PdfLine::Title(t) | PdfLine::Heading(t) | PdfLine::Text(t) => t,
            PdfLine::Blank => "",
        }
    }
}

/// Greedy word wrap. Words longer than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }
    lines
}

/// Lays `lines` out over as many letter-size pages as needed and returns
/// the serialized document.
pub fn write_pdf(lines: &[PdfLine]) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font("Courier"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let chunks: Vec<&[PdfLine]> = if lines.is_empty() {
        vec![lines]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };
    let page_count = chunks.len();

    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for (index, chunk) in chunks.into_iter().enumerate() {
        let content = page_content(chunk, index + 1, page_count);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = add_page(&mut doc, pages_id, resources_id, content_id);
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

fn font(base: &str) -> Object {
    Object::Dictionary(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    })
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    content_id: ObjectId,
) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    })
}

fn page_content(lines: &[PdfLine], page: usize, page_count: usize) -> String {
    let mut content = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        if !matches!(line, PdfLine::Blank) {
            let (font, size) = line.font();
            content.push_str(&format!(
                "BT\n/{} {} Tf\n{} {} Td\n({}) Tj\nET\n",
                font,
                size,
                MARGIN,
                y,
                escape_pdf_string(line.text())
            ));
        }
        y -= LINE_HEIGHT;
    }

    content.push_str(&format!(
        "BT\n/F1 8 Tf\n{} {} Td\n(Page {} of {}) Tj\nET\n",
        PAGE_WIDTH - MARGIN - 70,
        MARGIN / 2,
        page,
        page_count
    ));
    content
}

/// Escapes PDF string delimiters. Typographic quotes and dashes are folded
/// to ASCII; anything else non-ASCII becomes `?`.
fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii() && !c.is_control() => out.push(c),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2022}' => out.push('*'),
            _ => out.push('?'),
        }
    }
    out
}
