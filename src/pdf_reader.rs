use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use encoding_rs::{BIG5, UTF_16BE};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::ExtractError;
use crate::model::{BoundingBox, Token, TokenOrigin};

/// Advance of a glyph whose font carries no width table, in text space units.
const DEFAULT_GLYPH_WIDTH: f32 = 0.5;
/// `TJ` adjustments beyond this (thousandths of an em) separate words.
const TJ_WORD_BREAK: f32 = 100.0;
/// Gap between glyphs, relative to font size, that starts a new word.
const WORD_GAP_RATIO: f32 = 0.3;
const ASCENT_RATIO: f32 = 0.8;
const DESCENT_RATIO: f32 = 0.2;
/// Letter-size fallback when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
/// Form XObjects nested deeper than this are not walked.
const MAX_FORM_DEPTH: usize = 8;

/// Grid used to place text-layer lines that come without geometry.
const LAYOUT_CHAR_WIDTH: f32 = 7.2;
const LAYOUT_LINE_HEIGHT: f32 = 14.4;
const LAYOUT_FONT_SIZE: f32 = 12.0;

fn looks_decoding_broken(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();

    replacement * 8 > total || control * 5 > total
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    if bytes.starts_with(&[0xFE, 0xFF]) || bytes.starts_with(&[0xFF, 0xFE]) {
        let bytes = if bytes.len() > 2 { &bytes[2..] } else { bytes };
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    if let Some(name) = encoding {
        let lower = name.to_ascii_lowercase();

        if lower.contains("utf16")
            || lower.contains("ucs2")
            || lower.contains("identity-h")
            || lower.contains("unicode")
        {
            let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
            if !had_errors && !utf16.is_empty() {
                return utf16.into_owned();
            }
        }

        if lower.contains("big5")
            || lower.contains("b5")
            || lower.contains("eten")
            || lower.contains("cns")
        {
            let (big5, _, had_errors) = BIG5.decode(bytes);
            if !had_errors && !big5.is_empty() {
                return big5.into_owned();
            }
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Looks `key` up on the page node, then on its ancestors.
fn inherited<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = document.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return resolve(document, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(document: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(values) = inherited(document, page_id, b"MediaBox").and_then(|obj| obj.as_array().ok())
    else {
        return DEFAULT_MEDIA_BOX;
    };
    let numbers = values
        .iter()
        .filter_map(|value| resolve(document, value).and_then(number))
        .collect::<Vec<_>>();
    match numbers.as_slice() {
        [x0, y0, x1, y1] if x1 > x0 && y1 > y0 => [*x0, *y0, *x1, *y1],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Row-vector affine matrix `[a b 0; c d 0; e f 1]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values = operands.iter().map(number).collect::<Option<Vec<_>>>()?;
        let [a, b, c, d, e, f] = values.as_slice() else {
            return None;
        };
        Some(Self {
            a: *a,
            b: *b,
            c: *c,
            d: *d,
            e: *e,
            f: *f,
        })
    }

    /// `self × other`.
    fn then(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn translated(self, tx: f32, ty: f32) -> Self {
        Self {
            e: tx * self.a + ty * self.c + self.e,
            f: tx * self.b + ty * self.d + self.f,
            ..self
        }
    }

    fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn vertical_scale(self) -> f32 {
        self.c.hypot(self.d)
    }
}

#[derive(Debug, Clone)]
struct FontMetrics {
    encoding: Option<String>,
    first_char: i64,
    widths: Vec<f32>,
    missing_width: f32,
}

impl FontMetrics {
    fn from_dictionary(document: &Document, font: &Dictionary) -> Self {
        let encoding = Some(font.get_font_encoding().to_string());
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|value| resolve(document, value))
            .and_then(|value| value.as_i64().ok())
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|value| resolve(document, value))
            .and_then(|value| value.as_array().ok())
            .map(|values| {
                values
                    .iter()
                    .map(|value| resolve(document, value).and_then(number).unwrap_or(0.0) / 1000.0)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let missing_width = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|value| resolve(document, value))
            .and_then(|value| value.as_dict().ok())
            .and_then(|descriptor| descriptor.get(b"MissingWidth").ok())
            .and_then(number)
            .map_or(DEFAULT_GLYPH_WIDTH, |width| width / 1000.0);

        Self {
            encoding,
            first_char,
            widths,
            missing_width,
        }
    }

    fn byte_width(&self, byte: u8) -> f32 {
        usize::try_from(i64::from(byte) - self.first_char)
            .ok()
            .and_then(|index| self.widths.get(index))
            .copied()
            .filter(|width| *width > 0.0)
            .unwrap_or(self.missing_width)
    }

    /// Decoded characters paired with their advance widths (text space).
    fn glyphs(&self, bytes: &[u8]) -> Vec<(char, f32)> {
        let text = decode_pdf_bytes(self.encoding.as_deref(), bytes);
        let chars = text.chars().collect::<Vec<_>>();
        if !self.widths.is_empty() && chars.len() == bytes.len() {
            chars
                .into_iter()
                .zip(bytes.iter().map(|byte| self.byte_width(*byte)))
                .collect()
        } else {
            chars
                .into_iter()
                .map(|ch| (ch, DEFAULT_GLYPH_WIDTH))
                .collect()
        }
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            encoding: None,
            first_char: 0,
            widths: Vec::new(),
            missing_width: DEFAULT_GLYPH_WIDTH,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// A shown character in user space. Whitespace glyphs mark word breaks.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Glyph {
    ch: char,
    x0: f32,
    x1: f32,
    baseline: f32,
    size: f32,
}

type FontTable = BTreeMap<Vec<u8>, FontMetrics>;

struct TextWalker {
    fonts: FontTable,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    glyphs: Vec<Glyph>,
}

impl TextWalker {
    fn new(fonts: FontTable) -> Self {
        Self {
            fonts,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            glyphs: Vec::new(),
        }
    }

    fn metrics(&self) -> FontMetrics {
        self.state
            .font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .cloned()
            .unwrap_or_default()
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = self.line_matrix.translated(tx, ty);
        self.text_matrix = self.line_matrix;
    }

    fn push_break(&mut self) {
        if self.glyphs.last().is_some_and(|glyph| !glyph.ch.is_whitespace()) {
            let (x, y) = self.text_matrix.then(self.state.ctm).apply(0.0, 0.0);
            self.glyphs.push(Glyph {
                ch: ' ',
                x0: x,
                x1: x,
                baseline: y,
                size: 0.0,
            });
        }
    }

    fn show(&mut self, bytes: &[u8]) {
        let metrics = self.metrics();
        let state = self.state.clone();
        for (ch, width) in metrics.glyphs(bytes) {
            let mut advance = width * state.font_size + state.char_spacing;
            if ch == ' ' {
                advance += state.word_spacing;
            }
            advance *= state.horizontal_scale;

            let rendering = self.text_matrix.then(state.ctm);
            let (x0, baseline) = rendering.apply(0.0, state.rise);
            let (x1, _) = rendering.apply(advance, state.rise);
            self.glyphs.push(Glyph {
                ch,
                x0: x0.min(x1),
                x1: x0.max(x1),
                baseline,
                size: state.font_size * rendering.vertical_scale(),
            });
            self.text_matrix = self.text_matrix.translated(advance, 0.0);
        }
    }

    fn show_array(&mut self, items: &[Object]) {
        for item in items {
            match item {
                Object::String(bytes, _) => self.show(bytes),
                other => {
                    if let Some(adjustment) = number(other) {
                        let tx = -adjustment / 1000.0
                            * self.state.font_size
                            * self.state.horizontal_scale;
                        self.text_matrix = self.text_matrix.translated(tx, 0.0);
                        if -adjustment > TJ_WORD_BREAK {
                            self.push_break();
                        }
                    }
                }
            }
        }
    }

    /// Runs `body` inside a Form XObject: `matrix` is concatenated onto the
    /// CTM, `fonts` replace the current ones when the form has resources, and
    /// the graphics state is restored afterwards.
    fn in_form(
        &mut self,
        matrix: Matrix,
        fonts: Option<FontTable>,
        body: impl FnOnce(&mut Self),
    ) {
        let saved_state = self.state.clone();
        let saved_depth = self.stack.len();
        let saved_fonts = fonts.map(|fonts| std::mem::replace(&mut self.fonts, fonts));

        self.push_break();
        self.state.ctm = matrix.then(self.state.ctm);
        body(self);
        self.push_break();

        self.state = saved_state;
        self.stack.truncate(saved_depth);
        if let Some(fonts) = saved_fonts {
            self.fonts = fonts;
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let operand = |index: usize| operands.get(index).and_then(number);
        match operator {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.state.ctm = matrix.then(self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "ET" => self.push_break(),
            "Tf" => {
                if let Some(name) = operands.first().and_then(|name| name.as_name().ok()) {
                    self.state.font = Some(name.to_vec());
                }
                if let Some(size) = operand(1) {
                    self.state.font_size = size;
                }
            }
            "Tc" => self.state.char_spacing = operand(0).unwrap_or(0.0),
            "Tw" => self.state.word_spacing = operand(0).unwrap_or(0.0),
            "Tz" => self.state.horizontal_scale = operand(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.leading = operand(0).unwrap_or(0.0),
            "Ts" => self.state.rise = operand(0).unwrap_or(0.0),
            "Td" => {
                self.push_break();
                self.next_line(operand(0).unwrap_or(0.0), operand(1).unwrap_or(0.0));
            }
            "TD" => {
                self.push_break();
                let ty = operand(1).unwrap_or(0.0);
                self.state.leading = -ty;
                self.next_line(operand(0).unwrap_or(0.0), ty);
            }
            "Tm" => {
                self.push_break();
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.line_matrix = matrix;
                    self.text_matrix = matrix;
                }
            }
            "T*" => {
                self.push_break();
                self.next_line(0.0, -self.state.leading);
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items);
                }
            }
            "'" => {
                self.push_break();
                self.next_line(0.0, -self.state.leading);
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.push_break();
                self.state.word_spacing = operand(0).unwrap_or(self.state.word_spacing);
                self.state.char_spacing = operand(1).unwrap_or(self.state.char_spacing);
                self.next_line(0.0, -self.state.leading);
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
struct WordBuilder {
    text: String,
    x0: f32,
    x1: f32,
    baseline: f32,
    size: f32,
}

impl WordBuilder {
    fn continues(&self, glyph: &Glyph) -> bool {
        let tolerance = self.size.max(glyph.size);
        (glyph.baseline - self.baseline).abs() <= tolerance * 0.5
            && glyph.x0 - self.x1 <= tolerance * WORD_GAP_RATIO
            && glyph.x0 >= self.x0 - tolerance * 0.1
    }
}

/// Joins glyphs into word tokens and flips them into top-down page space.
fn words_from_glyphs(glyphs: &[Glyph], media_box: [f32; 4]) -> Vec<Token> {
    let [left, _, _, top] = media_box;
    let mut tokens = Vec::new();
    let mut current: Option<WordBuilder> = None;

    let flush = |word: Option<WordBuilder>, tokens: &mut Vec<Token>| {
        let Some(word) = word else {
            return;
        };
        let baseline = top - word.baseline;
        tokens.push(Token::new(
            word.text,
            BoundingBox::new(
                word.x0 - left,
                baseline - word.size * ASCENT_RATIO,
                word.x1 - left,
                baseline + word.size * DESCENT_RATIO,
            ),
            TokenOrigin::PdfText,
        ));
    };

    for glyph in glyphs {
        if glyph.ch.is_whitespace() || glyph.ch.is_control() {
            flush(current.take(), &mut tokens);
            continue;
        }

        if let Some(word) = current.as_mut().filter(|word| word.continues(glyph)) {
            word.text.push(glyph.ch);
            word.x1 = word.x1.max(glyph.x1);
            continue;
        }

        flush(current.take(), &mut tokens);
        current = Some(WordBuilder {
            text: glyph.ch.to_string(),
            x0: glyph.x0,
            x1: glyph.x1,
            baseline: glyph.baseline,
            size: glyph.size,
        });
    }
    flush(current.take(), &mut tokens);

    tokens
}

/// Text-layer lines placed on a monospace grid, one token per word.
fn layout_tokens(page_text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (line_index, line) in page_text.lines().enumerate() {
        let top = line_index as f32 * LAYOUT_LINE_HEIGHT;
        let mut column = 0_usize;
        let mut word = String::new();
        let mut word_start = 0_usize;

        for ch in line.chars().chain(std::iter::once(' ')) {
            if ch.is_whitespace() {
                if !word.is_empty() {
                    let x0 = word_start as f32 * LAYOUT_CHAR_WIDTH;
                    let x1 = column as f32 * LAYOUT_CHAR_WIDTH;
                    tokens.push(Token::new(
                        std::mem::take(&mut word),
                        BoundingBox::new(x0, top, x1, top + LAYOUT_FONT_SIZE),
                        TokenOrigin::PdfLayoutText,
                    ));
                }
            } else {
                if word.is_empty() {
                    word_start = column;
                }
                word.push(ch);
            }
            column += if ch == '\t' { 4 } else { 1 };
        }
    }
    tokens
}

/// A loaded PDF and the per-page text layer.
pub struct PdfDocument {
    path: PathBuf,
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
    layout_pages: OnceCell<Option<Vec<String>>>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let document = Document::load(path)?;
        let pages = document.get_pages();
        debug!(path = %path.display(), pages = pages.len(), "loaded PDF");
        Ok(Self {
            path: path.to_path_buf(),
            document,
            pages,
            layout_pages: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    /// Positioned tokens for `page`, including text drawn inside Form
    /// XObjects. Falls back to grid-placed text-layer lines when the content
    /// stream yields nothing usable, e.g. fonts that only decode through a
    /// `ToUnicode` map.
    #[must_use]
    pub fn page_tokens(&self, page: u32) -> Vec<Token> {
        let Some(&page_id) = self.pages.get(&page) else {
            return Vec::new();
        };

        let tokens = self.positioned_tokens(page_id);
        if !tokens.is_empty() {
            return tokens;
        }

        self.layout_page_text(page)
            .map(layout_tokens)
            .unwrap_or_default()
    }

    fn positioned_tokens(&self, page_id: ObjectId) -> Vec<Token> {
        let Ok(raw_content) = self.document.get_page_content(page_id) else {
            return Vec::new();
        };

        let fonts = self
            .document
            .get_page_fonts(page_id)
            .into_iter()
            .map(|(name, font)| (name, FontMetrics::from_dictionary(&self.document, font)))
            .collect::<FontTable>();
        let resources = inherited(&self.document, page_id, b"Resources")
            .and_then(|resources| resources.as_dict().ok());

        let mut walker = TextWalker::new(fonts);
        self.walk_content(&mut walker, &raw_content, resources, 0);

        words_from_glyphs(&walker.glyphs, media_box(&self.document, page_id))
    }

    fn walk_content<'a>(
        &'a self,
        walker: &mut TextWalker,
        raw_content: &[u8],
        resources: Option<&'a Dictionary>,
        depth: usize,
    ) {
        let Ok(content) = Content::decode(raw_content) else {
            debug!(depth, "undecodable content stream skipped");
            return;
        };

        for operation in &content.operations {
            if operation.operator != "Do" {
                walker.apply(operation.operator.as_str(), &operation.operands);
                continue;
            }
            let form = operation
                .operands
                .first()
                .and_then(|name| name.as_name().ok())
                .zip(resources)
                .and_then(|(name, resources)| self.form_xobject(resources, name));
            if let Some(form) = form {
                self.walk_form(walker, form, resources, depth + 1);
            }
        }
    }

    fn walk_form<'a>(
        &'a self,
        walker: &mut TextWalker,
        form: &'a Stream,
        parent: Option<&'a Dictionary>,
        depth: usize,
    ) {
        if depth > MAX_FORM_DEPTH {
            debug!(depth, "form XObject nesting too deep; skipped");
            return;
        }

        let raw_content = if stream_filters(form).is_empty() {
            form.content.clone()
        } else {
            match form.decompressed_content() {
                Ok(content) => content,
                Err(error) => {
                    debug!(%error, "unreadable form XObject skipped");
                    return;
                }
            }
        };

        let own_resources = form
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|resources| resolve(&self.document, resources))
            .and_then(|resources| resources.as_dict().ok());
        let fonts = own_resources.map(|resources| self.resource_fonts(resources));
        let resources = own_resources.or(parent);
        let matrix = form
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|matrix| resolve(&self.document, matrix))
            .and_then(|matrix| matrix.as_array().ok())
            .and_then(|values| Matrix::from_operands(values.as_slice()))
            .unwrap_or(Matrix::IDENTITY);

        walker.in_form(matrix, fonts, |walker| {
            self.walk_content(walker, &raw_content, resources, depth);
        });
    }

    /// The Form XObject registered as `name`; image XObjects yield `None`.
    fn form_xobject<'a>(&'a self, resources: &'a Dictionary, name: &[u8]) -> Option<&'a Stream> {
        let xobjects = resources
            .get(b"XObject")
            .ok()
            .and_then(|xobjects| resolve(&self.document, xobjects))?
            .as_dict()
            .ok()?;
        let Object::Stream(stream) = resolve(&self.document, xobjects.get(name).ok()?)? else {
            return None;
        };
        let subtype = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|subtype| subtype.as_name().ok());
        (subtype == Some(b"Form".as_slice())).then_some(stream)
    }

    fn resource_fonts(&self, resources: &Dictionary) -> FontTable {
        resources
            .get(b"Font")
            .ok()
            .and_then(|fonts| resolve(&self.document, fonts))
            .and_then(|fonts| fonts.as_dict().ok())
            .map(|fonts| {
                fonts
                    .iter()
                    .filter_map(|(name, font)| {
                        let font = resolve(&self.document, font)?.as_dict().ok()?;
                        Some((name.clone(), FontMetrics::from_dictionary(&self.document, font)))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn layout_page_text(&self, page: u32) -> Option<&str> {
        let pages = self.layout_pages.get_or_init(|| {
            let pages = pdf_extract::extract_text_by_pages(&self.path).ok()?;
            if pages.len() == self.pages.len() {
                Some(pages)
            } else {
                debug!(
                    expected = self.pages.len(),
                    found = pages.len(),
                    "text layer page count mismatch; layout fallback disabled"
                );
                None
            }
        });

        let index = usize::try_from(page.checked_sub(1)?).ok()?;
        pages
            .as_ref()?
            .get(index)
            .map(String::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    /// Writes image XObjects drawn on `page` into `dir`. Returns the written
    /// files and a note for every image that could not be exported.
    pub fn extract_embedded_images(
        &self,
        page: u32,
        dir: &Path,
        stem: &str,
    ) -> Result<(Vec<PathBuf>, Vec<String>), ExtractError> {
        let mut written = Vec::new();
        let mut skipped = Vec::new();
        let Some(&page_id) = self.pages.get(&page) else {
            return Ok((written, skipped));
        };
        let Some(xobjects) = inherited(&self.document, page_id, b"Resources")
            .and_then(|resources| resources.as_dict().ok())
            .and_then(|resources| resources.get(b"XObject").ok())
            .and_then(|xobjects| resolve(&self.document, xobjects))
            .and_then(|xobjects| xobjects.as_dict().ok())
        else {
            return Ok((written, skipped));
        };

        let mut index = 0_usize;
        for (name, value) in xobjects.iter() {
            let Some(Object::Stream(stream)) = resolve(&self.document, value) else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .ok()
                .and_then(|subtype| subtype.as_name().ok())
                == Some(b"Image".as_slice());
            if !is_image {
                continue;
            }

            let name = String::from_utf8_lossy(name);
            match export_image(&self.document, stream, dir, &format!("{stem}_page{page}_img{index}"))
            {
                Ok(Some(path)) => {
                    written.push(path);
                    index += 1;
                }
                Ok(None) => skipped.push(format!("image /{name} uses an unsupported encoding")),
                Err(error) => skipped.push(format!("image /{name}: {error}")),
            }
        }

        Ok((written, skipped))
    }
}

fn stream_filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn export_image(
    document: &Document,
    stream: &Stream,
    dir: &Path,
    base_name: &str,
) -> Result<Option<PathBuf>, ExtractError> {
    let filters = stream_filters(stream);
    if filters.last().is_some_and(|filter| filter == b"DCTDecode") {
        let path = dir.join(format!("{base_name}.jpg"));
        std::fs::write(&path, &stream.content)?;
        return Ok(Some(path));
    }

    if !filters.iter().all(|filter| filter == b"FlateDecode") {
        return Ok(None);
    }

    let dimension = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .ok()
            .and_then(|value| resolve(document, value))
            .and_then(|value| value.as_i64().ok())
            .and_then(|value| u32::try_from(value).ok())
    };
    let (Some(width), Some(height)) = (dimension(b"Width"), dimension(b"Height")) else {
        return Ok(None);
    };
    if dimension(b"BitsPerComponent") != Some(8) {
        return Ok(None);
    }
    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|value| resolve(document, value))
        .and_then(|value| value.as_name().ok())
        .map(<[u8]>::to_vec);

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        // lopdf refuses to decode streams marked as images.
        let mut plain = stream.clone();
        plain.dict.remove(b"Subtype");
        plain.decompressed_content()?
    };
    let path = dir.join(format!("{base_name}.png"));
    match color_space.as_deref() {
        Some(b"DeviceRGB") => {
            let Some(image) = image::RgbImage::from_raw(width, height, data) else {
                return Ok(None);
            };
            image.save(&path)?;
        }
        Some(b"DeviceGray") => {
            let Some(image) = image::GrayImage::from_raw(width, height, data) else {
                return Ok(None);
            };
            image.save(&path)?;
        }
        _ => return Ok(None),
    }

    Ok(Some(path))
}
