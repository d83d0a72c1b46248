//! Positioned text and page images from PDFs using lopdf.

use std::collections::BTreeMap;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Encoding, Object, ObjectId, Stream};
use tracing::{debug, trace};

use super::Result;
use crate::error::PdfError;
use crate::layout::PositionedToken;
use crate::services::PageSource;

/// Rough glyph width as a fraction of the font size, for advancing the pen.
const APPROX_CHAR_WIDTH: f32 = 0.5;

/// Form XObjects may draw other forms; deeper nesting is ignored.
const MAX_FORM_DEPTH: usize = 8;

/// `[a b c d e f]` as in the PDF operators.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Text decoders of the fonts in one resource dictionary, by resource name.
type FontEncodings<'a> = BTreeMap<Vec<u8>, Encoding<'a>>;

/// Page source backed by a parsed PDF document.
pub struct LopdfPageSource {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfPageSource {
    /// Parse a PDF from memory. Encrypted files are tried with an empty password.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut document = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", pages.len());
        Ok(Self { document, pages })
    }

    /// Read and parse a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref()).map_err(|e| PdfError::Parse(e.to_string()))?;
        Self::load(&data)
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages.get(&page).copied().ok_or(PdfError::InvalidPage(page))
    }

    /// Resources of a page, inherited from the page tree when absent.
    fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let mut node_id = page_id;
        // Bounded walk up the page tree.
        for _ in 0..32 {
            let Ok(Object::Dictionary(node)) = self.document.get_object(node_id) else {
                return None;
            };
            if let Ok(resources) = node.get(b"Resources") {
                if let Ok((_, Object::Dictionary(dict))) = self.document.dereference(resources) {
                    return Some(dict);
                }
            }
            match node.get(b"Parent") {
                Ok(Object::Reference(parent)) => node_id = *parent,
                _ => return None,
            }
        }
        None
    }

    fn page_images(&self, page_id: ObjectId) -> Vec<DynamicImage> {
        let Some(resources) = self.page_resources(page_id) else {
            return Vec::new();
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Vec::new();
        };
        let Ok((_, Object::Dictionary(xobjects))) = self.document.dereference(xobjects) else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(_, obj)| self.document.dereference(obj).ok())
            .filter_map(|(_, obj)| decode_image(&self.document, obj))
            .collect()
    }
}

impl PageSource for LopdfPageSource {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_tokens(&self, page: u32) -> std::result::Result<Vec<PositionedToken>, PdfError> {
        let page_id = self.page_id(page)?;
        let data = self
            .document
            .get_page_content(page_id)
            .map_err(|e| PdfError::Content(e.to_string()))?;
        let content = Content::decode(&data).map_err(|e| PdfError::Content(e.to_string()))?;

        let mut walker = TextWalker::new(&self.document);
        walker.walk(
            &content,
            self.page_resources(page_id),
            GraphicsState::default(),
            0,
        );
        trace!("Page {}: {} text tokens", page, walker.tokens.len());
        Ok(walker.tokens)
    }

    /// The largest image embedded on the page. Scanned statements carry one.
    fn render_page(&self, page: u32) -> std::result::Result<DynamicImage, PdfError> {
        let page_id = self.page_id(page)?;
        self.page_images(page_id)
            .into_iter()
            .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
            .ok_or_else(|| PdfError::ImageExtraction(format!("no image on page {}", page)))
    }
}

/// `a` then `b`: the product `a × b` in PDF's row-vector convention.
fn concat(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

/// The part of the graphics state that `q` saves and `Q` restores.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 0.0,
            leading: 0.0,
        }
    }
}

/// Text and line matrices of the current text object.
struct TextState {
    matrix: Matrix,
    line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: IDENTITY,
            line_matrix: IDENTITY,
        }
    }
}

impl TextState {
    fn set_matrix(&mut self, matrix: Matrix) {
        self.matrix = matrix;
        self.line_matrix = matrix;
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.set_matrix(concat(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix));
    }

    fn next_line(&mut self, leading: f32) {
        self.translate_line(0.0, -leading);
    }

    fn advance(&mut self, dx: f32) {
        self.matrix[4] += dx * self.matrix[0];
        self.matrix[5] += dx * self.matrix[1];
    }

    fn advance_text(&mut self, text: &str, font_size: f32) {
        let width = text.chars().count() as f32 * font_size * APPROX_CHAR_WIDTH;
        self.advance(width);
    }

    /// Device space position of the next glyph.
    fn origin(&self, ctm: &Matrix) -> (f32, f32) {
        let m = concat(&self.matrix, ctm);
        (m[4], m[5])
    }
}

/// Collects positioned text from a page's content stream and the forms it draws.
struct TextWalker<'a> {
    document: &'a Document,
    tokens: Vec<PositionedToken>,
}

impl<'a> TextWalker<'a> {
    fn new(document: &'a Document) -> Self {
        Self {
            document,
            tokens: Vec::new(),
        }
    }

    fn walk(
        &mut self,
        content: &Content,
        resources: Option<&'a Dictionary>,
        mut state: GraphicsState,
        depth: usize,
    ) {
        let fonts = self.font_encodings(resources);
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut text = TextState::default();

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        state = previous;
                    }
                }
                "cm" => {
                    if let Some(matrix) = matrix_operand(operands) {
                        state.ctm = concat(&matrix, &state.ctm);
                    }
                }
                "BT" => text = TextState::default(),
                "Tf" => {
                    state.font = operands
                        .first()
                        .and_then(|o| o.as_name().ok())
                        .map(<[u8]>::to_vec);
                    if let Some(size) = operands.get(1).and_then(number) {
                        state.font_size = size;
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        state.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    let (Some(tx), Some(ty)) = (
                        operands.first().and_then(number),
                        operands.get(1).and_then(number),
                    ) else {
                        continue;
                    };
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    text.translate_line(tx, ty);
                }
                "Tm" => {
                    if let Some(matrix) = matrix_operand(operands) {
                        text.set_matrix(matrix);
                    }
                }
                "T*" => text.next_line(state.leading),
                "Tj" => {
                    if let Some(shown) = operands.first().and_then(|o| decode(&fonts, &state, o)) {
                        self.show(&mut text, &state, &shown);
                    }
                }
                "'" => {
                    text.next_line(state.leading);
                    if let Some(shown) = operands.first().and_then(|o| decode(&fonts, &state, o)) {
                        self.show(&mut text, &state, &shown);
                    }
                }
                "\"" => {
                    text.next_line(state.leading);
                    if let Some(shown) = operands.get(2).and_then(|o| decode(&fonts, &state, o)) {
                        self.show(&mut text, &state, &shown);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        self.show_array(&fonts, &mut text, &state, items);
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_form(resources, name, &state, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn show(&mut self, text: &mut TextState, state: &GraphicsState, shown: &str) {
        let shown = shown.trim();
        if shown.is_empty() {
            return;
        }
        let (x, y) = text.origin(&state.ctm);
        self.tokens.push(PositionedToken::new(x, y, shown));
        text.advance_text(shown, state.font_size);
    }

    /// `TJ`: strings interleaved with kerning in thousandths of text space.
    /// Large negative kerning is a word gap.
    fn show_array(
        &mut self,
        fonts: &FontEncodings<'_>,
        text: &mut TextState,
        state: &GraphicsState,
        items: &[Object],
    ) {
        let (x, y) = text.origin(&state.ctm);
        let mut buffer = String::new();

        for item in items {
            if let Some(fragment) = decode(fonts, state, item) {
                text.advance_text(&fragment, state.font_size);
                buffer.push_str(&fragment);
            } else if let Some(adjust) = number(item) {
                let dx = -adjust / 1000.0 * state.font_size;
                if dx > state.font_size * APPROX_CHAR_WIDTH * 0.3 && !buffer.is_empty() {
                    buffer.push(' ');
                }
                text.advance(dx);
            }
        }

        let shown = buffer.trim();
        if !shown.is_empty() {
            self.tokens.push(PositionedToken::new(x, y, shown));
        }
    }

    /// `Do` on a form XObject walks its content with the form matrix applied.
    /// Image XObjects carry no text and are skipped.
    fn draw_form(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        state: &GraphicsState,
        depth: usize,
    ) {
        if depth >= MAX_FORM_DEPTH {
            trace!("Form XObjects nested too deep, skipping");
            return;
        }
        let Some(form) = self.form_xobject(resources, name) else {
            return;
        };

        let content = match form
            .get_plain_content()
            .and_then(|data| Content::decode(&data))
        {
            Ok(content) => content,
            Err(e) => {
                debug!("Skipping unreadable form XObject: {}", e);
                return;
            }
        };

        let matrix = form
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|items| matrix_operand(items))
            .unwrap_or(IDENTITY);
        let form_resources = form
            .dict
            .get_deref(b"Resources", self.document)
            .and_then(Object::as_dict)
            .ok()
            .or(resources);

        let mut inner = state.clone();
        inner.ctm = concat(&matrix, &state.ctm);
        self.walk(&content, form_resources, inner, depth + 1);
    }

    fn form_xobject(&self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<&'a Stream> {
        let xobjects = resources?
            .get_deref(b"XObject", self.document)
            .and_then(Object::as_dict)
            .ok()?;
        let form = xobjects
            .get_deref(name, self.document)
            .and_then(Object::as_stream)
            .ok()?;
        let subtype = form.dict.get(b"Subtype").and_then(Object::as_name).ok()?;
        (subtype == b"Form").then_some(form)
    }

    /// Fonts declaring an encoding or a ToUnicode map decode through lopdf.
    /// The rest fall back to [`decode_pdf_string`].
    fn font_encodings(&self, resources: Option<&'a Dictionary>) -> FontEncodings<'a> {
        let Some(fonts) = resources
            .and_then(|r| r.get_deref(b"Font", self.document).ok())
            .and_then(|f| f.as_dict().ok())
        else {
            return BTreeMap::new();
        };

        fonts
            .iter()
            .filter_map(|(name, font)| {
                let font = self.document.dereference(font).ok()?.1.as_dict().ok()?;
                if font.get(b"Encoding").is_err() && font.get(b"ToUnicode").is_err() {
                    return None;
                }
                match font.get_font_encoding(self.document) {
                    Ok(encoding) => Some((name.clone(), encoding)),
                    Err(e) => {
                        trace!(
                            "Font {} has no usable encoding: {}",
                            String::from_utf8_lossy(name),
                            e
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

/// Decode a string operand with the current font's encoding.
fn decode(fonts: &FontEncodings<'_>, state: &GraphicsState, obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    let encoding = state.font.as_ref().and_then(|font| fonts.get(font));
    Some(match encoding {
        Some(encoding) => {
            Document::decode_text(encoding, bytes).unwrap_or_else(|_| decode_pdf_string(bytes))
        }
        None => decode_pdf_string(bytes),
    })
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    let values: Vec<f32> = operands.iter().take(6).filter_map(number).collect();
    <Matrix>::try_from(values).ok()
}

fn number(obj: &Object) -> Option<f32> {
    obj.as_float().ok()
}

/// Decode a PDF string: UTF-16BE with a byte order mark, otherwise WinAnsi.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    bytes.iter().map(|&b| win_ansi_char(b)).collect()
}

fn win_ansi_char(byte: u8) -> char {
    match byte {
        0x80 => '€',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        b => b as char,
    }
}

/// Decode an image XObject. JPEG and 8-bit RGB or gray are supported.
fn decode_image(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;
    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    trace!("Image XObject {}x{}", width, height);

    let filter = dict.get(b"Filter").ok().and_then(|f| match f {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(items) => items.first().and_then(|o| o.as_name().ok()),
        _ => None,
    });
    match filter {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("Unsupported image filter");
            return None;
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.clone()),
            Object::Array(items) => items.first().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec),
            Object::Reference(id) => doc
                .get_object(*id)
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(<[u8]>::to_vec),
            _ => None,
        })
        .unwrap_or_else(|| b"DeviceRGB".to_vec());

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let pixels = (width as usize) * (height as usize);

    match color_space.as_slice() {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data[..pixels * 3].to_vec())
                .map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data[..pixels].to_vec())
                .map(DynamicImage::ImageLuma8)
        }
        _ => {
            trace!("Cannot decode image data of {} bytes", data.len());
            None
        }
    }
}
