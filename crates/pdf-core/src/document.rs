//! PDF Document wrapper

use crate::font::{FontData, FontFace, FontFamilyBuilder, FontStyle, FontWeight, StandardFont};
use crate::text::{generate_text_operators, TextRenderContext};
use crate::{PdfError, Result};
use chrono::{DateTime, Utc};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// A buffered text operation for deferred encoding
///
/// Text is buffered while drawing and encoded during save, once every
/// page's font resources are known.
#[derive(Debug, Clone)]
struct BufferedTextOp {
    text: String,
    font_name: String,
    /// Page number (1-indexed)
    page: usize,
    /// Baseline origin in PDF coordinates
    x: f64,
    y: f64,
    font_size: f32,
    color: Color,
}

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new RGB color (values 0.0 - 1.0)
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create color from RGB values (0-255)
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Black color
    pub const fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    /// Red color
    pub const fn red() -> Self {
        Self::rgb(1.0, 0.0, 0.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// A font registered with the document
#[derive(Debug, Clone)]
pub struct RegisteredFont {
    /// Family the font belongs to (e.g. "Helvetica")
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub face: Arc<FontFace>,
}

/// PDF Document wrapper providing high-level operations
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Registered fonts by name
    fonts: BTreeMap<String, RegisteredFont>,
    /// Characters drawn per font (drives /W and ToUnicode)
    used_chars: HashMap<String, BTreeSet<char>>,
    /// Page font resources (page number -> font name -> resource name)
    page_font_resources: BTreeMap<usize, BTreeMap<String, String>>,
    /// Next font resource number
    next_font_resource: u32,
    /// Buffered text operations (encoded during save)
    buffered_text_ops: Vec<BufferedTextOp>,
}

impl PdfDocument {
    /// Open a PDF document from a file path
    ///
    /// # Example
    /// ```ignore
    /// let doc = PdfDocument::open("contract.pdf")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Open a PDF document from bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Wrap an already parsed lopdf document
    pub fn from_document(inner: Document) -> Self {
        Self {
            inner,
            fonts: BTreeMap::new(),
            used_chars: HashMap::new(),
            page_font_resources: BTreeMap::new(),
            next_font_resource: 1,
            buffered_text_ops: Vec::new(),
        }
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Get page width and height in points
    ///
    /// # Arguments
    /// * `page` - Page number (1-indexed)
    pub fn page_size(&self, page: usize) -> Result<(f64, f64)> {
        let page_id = self.page_id(page)?;
        let media_box = self.get_inherited_media_box(page_id)?;
        extract_size_from_media_box(&media_box)
    }

    /// Get the lower-left corner of the page's MediaBox in user space
    ///
    /// Most pages start at (0, 0); anything drawn with [`Self::draw_text`] on a
    /// page with an offset box must add this origin to page-relative coordinates.
    ///
    /// # Arguments
    /// * `page` - Page number (1-indexed)
    pub fn page_origin(&self, page: usize) -> Result<(f64, f64)> {
        let page_id = self.page_id(page)?;
        let media_box = self.get_inherited_media_box(page_id)?;
        extract_origin_from_media_box(&media_box)
    }

    /// Add a TrueType font to the document
    ///
    /// Weight and style are taken from the font's own OS/2 flags; the font's
    /// name doubles as its family name.
    pub fn add_font(&mut self, name: &str, ttf_data: &[u8]) -> Result<()> {
        self.ensure_unregistered(name)?;
        let data = FontData::from_ttf(name, ttf_data)?;
        let (weight, style) = data.declared_variant();
        self.fonts.insert(
            name.to_string(),
            RegisteredFont {
                family: name.to_string(),
                weight,
                style,
                face: Arc::new(FontFace::TrueType(data)),
            },
        );
        Ok(())
    }

    /// Register a font family with its variants
    ///
    /// # Example
    /// ```ignore
    /// doc.register_font_family("noto",
    ///     FontFamilyBuilder::new()
    ///         .regular(std::fs::read("NotoSans-Regular.ttf")?)
    ///         .bold(std::fs::read("NotoSans-Bold.ttf")?)
    /// )?;
    /// ```
    pub fn register_font_family(&mut self, name: &str, builder: FontFamilyBuilder) -> Result<()> {
        let variants = builder.build(name)?;
        for (data, _, _) in &variants {
            self.ensure_unregistered(&data.name)?;
        }
        for (data, weight, style) in variants {
            self.fonts.insert(
                data.name.clone(),
                RegisteredFont {
                    family: name.to_string(),
                    weight,
                    style,
                    face: Arc::new(FontFace::TrueType(data)),
                },
            );
        }
        Ok(())
    }

    /// Register a base-14 standard font under its PostScript name
    pub fn add_standard_font(&mut self, font: StandardFont) -> Result<()> {
        let name = font.base_name();
        self.ensure_unregistered(name)?;
        self.fonts.insert(
            name.to_string(),
            RegisteredFont {
                family: font.family().to_string(),
                weight: font.weight(),
                style: FontStyle::Normal,
                face: Arc::new(FontFace::Standard(font)),
            },
        );
        Ok(())
    }

    fn ensure_unregistered(&self, name: &str) -> Result<()> {
        if self.fonts.contains_key(name) {
            return Err(PdfError::FontAlreadyExists(name.to_string()));
        }
        Ok(())
    }

    /// Iterate over registered fonts in name order
    pub fn fonts(&self) -> impl Iterator<Item = (&str, &RegisteredFont)> {
        self.fonts.iter().map(|(name, font)| (name.as_str(), font))
    }

    /// Look up a registered font
    pub fn font(&self, name: &str) -> Result<&RegisteredFont> {
        self.fonts
            .get(name)
            .ok_or_else(|| PdfError::FontNotFound(name.to_string()))
    }

    /// Draw text with its baseline starting at a point
    ///
    /// # Arguments
    /// * `page` - Page number (1-indexed)
    /// * `text` - Text to draw
    /// * `x` - X coordinate in points (from left)
    /// * `y` - Y coordinate in points (from bottom)
    /// * `font_name` - Registered font name
    /// * `font_size` - Font size in points
    /// * `color` - Fill color
    #[allow(clippy::too_many_arguments)]
    pub fn draw_text(
        &mut self,
        page: usize,
        text: &str,
        x: f64,
        y: f64,
        font_name: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            return Err(PdfError::InvalidPage(page, page_count));
        }
        self.font(font_name)?;

        if text.trim().is_empty() {
            return Ok(());
        }

        self.used_chars
            .entry(font_name.to_string())
            .or_default()
            .extend(text.chars());
        self.get_or_create_font_ref(font_name, page);

        self.buffered_text_ops.push(BufferedTextOp {
            text: text.to_string(),
            font_name: font_name.to_string(),
            page,
            x,
            y,
            font_size,
            color,
        });

        Ok(())
    }

    /// Write the document modification date into the Info dictionary
    pub fn set_modification_date(&mut self, when: DateTime<Utc>) -> Result<()> {
        let stamp = when.format("D:%Y%m%d%H%M%SZ").to_string();

        let existing = match self.inner.trailer.get_mut(b"Info") {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Dictionary(info)) => {
                info.set("ModDate", Object::string_literal(stamp));
                return Ok(());
            }
            _ => None,
        };
        let info_id = match existing {
            Some(id) => id,
            None => {
                let id = self.inner.add_object(Dictionary::new());
                self.inner.trailer.set("Info", Object::Reference(id));
                id
            }
        };

        let info = self
            .inner
            .get_object_mut(info_id)?
            .as_dict_mut()
            .map_err(|_| PdfError::ParseError("Info is not a dictionary".to_string()))?;
        info.set("ModDate", Object::string_literal(stamp));
        Ok(())
    }

    /// Save the document to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        // 1. Encode buffered text into per-page operator runs
        let page_content = self.encode_buffered_text()?;

        // 2. Append one isolated content stream per page
        for (page, content) in page_content {
            self.append_to_content_stream(page, &content)?;
        }

        // 3. Embed used fonts and wire page resources
        let embedded = self.embed_fonts()?;
        self.finalize_page_font_resources(&embedded)?;

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(buffer)
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        pages
            .get(&(page as u32))
            .copied()
            .ok_or(PdfError::InvalidPage(page, pages.len()))
    }

    /// Get or create a font resource name ("F1", "F2", ...) for a page
    fn get_or_create_font_ref(&mut self, font_name: &str, page: usize) -> String {
        let page_resources = self.page_font_resources.entry(page).or_default();
        if let Some(resource_name) = page_resources.get(font_name) {
            return resource_name.clone();
        }

        let resource_name = format!("F{}", self.next_font_resource);
        self.next_font_resource += 1;
        page_resources.insert(font_name.to_string(), resource_name.clone());
        resource_name
    }

    fn encode_buffered_text(&mut self) -> Result<BTreeMap<usize, Vec<u8>>> {
        let text_ops = std::mem::take(&mut self.buffered_text_ops);
        let mut page_content: BTreeMap<usize, Vec<u8>> = BTreeMap::new();

        for op in text_ops {
            let operand = self.font(&op.font_name)?.face.encode(&op.text);
            let ctx = TextRenderContext {
                font_name: self.get_or_create_font_ref(&op.font_name, op.page),
                font_size: op.font_size,
                color: op.color,
            };
            page_content
                .entry(op.page)
                .or_default()
                .extend(generate_text_operators(&operand, op.x, op.y, &ctx));
        }

        Ok(page_content)
    }

    /// Embed every font that was drawn with, returning name -> object id
    fn embed_fonts(&mut self) -> Result<HashMap<String, ObjectId>> {
        let mut embedded = HashMap::new();
        let used: Vec<(String, BTreeSet<char>)> = self
            .used_chars
            .iter()
            .map(|(name, chars)| (name.clone(), chars.clone()))
            .collect();

        for (font_name, chars) in used {
            let face = Arc::clone(&self.font(&font_name)?.face);
            let font_id = match face.as_ref() {
                FontFace::Standard(font) => self.inner.add_object(font.to_pdf_dict()),
                FontFace::TrueType(data) => self.embed_truetype(data, &chars),
            };
            embedded.insert(font_name, font_id);
        }

        Ok(embedded)
    }

    fn embed_truetype(&mut self, data: &FontData, chars: &BTreeSet<char>) -> ObjectId {
        let objects = data.to_pdf_objects(chars);

        let font_file_id = self.inner.add_object(objects.font_file_stream);

        let mut font_descriptor = objects.font_descriptor;
        font_descriptor.set("FontFile2", Object::Reference(font_file_id));
        let font_descriptor_id = self.inner.add_object(font_descriptor);

        let mut cid_font = objects.cid_font;
        cid_font.set("FontDescriptor", Object::Reference(font_descriptor_id));
        let cid_font_id = self.inner.add_object(cid_font);

        let tounicode_id = self.inner.add_object(objects.tounicode_stream);

        let mut type0_font = objects.type0_font;
        type0_font.set(
            "DescendantFonts",
            Object::Array(vec![Object::Reference(cid_font_id)]),
        );
        type0_font.set("ToUnicode", Object::Reference(tounicode_id));
        self.inner.add_object(type0_font)
    }

    fn finalize_page_font_resources(&mut self, embedded: &HashMap<String, ObjectId>) -> Result<()> {
        let page_resources = std::mem::take(&mut self.page_font_resources);
        for (page, fonts) in &page_resources {
            self.add_fonts_to_page_resources(*page, fonts, embedded)?;
        }
        Ok(())
    }

    /// Add font references to a page's Resources dictionary
    ///
    /// Indirect Resources and Font dictionaries are resolved and written back
    /// inline on the page.
    fn add_fonts_to_page_resources(
        &mut self,
        page: usize,
        fonts: &BTreeMap<String, String>,
        embedded: &HashMap<String, ObjectId>,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        let page_dict = self.inner.get_dictionary(page_id)?.clone();

        let mut resources = match page_dict.get(b"Resources") {
            Ok(obj) => self.resolve_dict(obj),
            Err(_) => self.inherited_resources(page_id),
        };
        let mut font_dict = resources
            .get(b"Font")
            .map(|obj| self.resolve_dict(obj))
            .unwrap_or_default();

        for (font_name, resource_name) in fonts {
            let font_ref = embedded
                .get(font_name)
                .ok_or_else(|| PdfError::FontNotFound(font_name.to_string()))?;
            font_dict.set(resource_name.as_bytes().to_vec(), Object::Reference(*font_ref));
        }
        resources.set("Font", Object::Dictionary(font_dict));

        let mut new_page_dict = page_dict;
        new_page_dict.set("Resources", Object::Dictionary(resources));
        self.inner.objects.insert(page_id, new_page_dict.into());
        Ok(())
    }

    fn resolve_dict(&self, obj: &Object) -> Dictionary {
        match obj {
            Object::Dictionary(dict) => dict.clone(),
            Object::Reference(id) => self
                .inner
                .get_dictionary(*id)
                .map(|d| d.clone())
                .unwrap_or_default(),
            _ => Dictionary::new(),
        }
    }

    /// Resources inherited from the page tree, if any
    fn inherited_resources(&self, page_id: ObjectId) -> Dictionary {
        let mut current = page_id;
        for _ in 0..10 {
            let Ok(dict) = self.inner.get_dictionary(current) else {
                break;
            };
            if let Ok(resources) = dict.get(b"Resources") {
                return self.resolve_dict(resources);
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => current = *parent,
                _ => break,
            }
        }
        Dictionary::new()
    }

    /// Get MediaBox, following parent inheritance chain if needed
    fn get_inherited_media_box(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let mut current_id = page_id;

        // Follow parent chain up to 10 levels
        for _ in 0..10 {
            let dict = self.inner.get_dictionary(current_id)?;

            if let Ok(media_box) = dict.get(b"MediaBox").or_else(|_| dict.get(b"CropBox")) {
                return match media_box {
                    Object::Array(arr) => Ok(arr.clone()),
                    Object::Reference(ref_id) => Ok(self
                        .inner
                        .get_object(*ref_id)?
                        .as_array()
                        .map_err(|_| {
                            PdfError::ParseError("MediaBox reference is not an array".to_string())
                        })?
                        .clone()),
                    _ => Err(PdfError::ParseError("MediaBox is not an array".to_string())),
                };
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => break,
            }
        }

        // Fallback: A4
        Ok(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(595.28),
            Object::Real(841.89),
        ])
    }

    /// Append content to a page, isolated from the existing content
    ///
    /// The page's Contents become `[q, existing..., Q + content]` so graphics
    /// state left over by the original content cannot shift the new text.
    fn append_to_content_stream(&mut self, page: usize, content: &[u8]) -> Result<()> {
        let page_id = self.page_id(page)?;
        let mut page_dict = self.inner.get_dictionary(page_id)?.clone();

        let existing: Vec<Object> = match page_dict.get(b"Contents") {
            Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
            Ok(Object::Array(arr)) => arr.clone(),
            Ok(Object::Stream(stream)) => {
                vec![Object::Reference(self.inner.add_object(stream.clone()))]
            }
            _ => Vec::new(),
        };

        let open_id = self.inner.add_object(compressed_stream(b"q\n")?);
        let mut closing = b"Q\n".to_vec();
        closing.extend_from_slice(content);
        let close_id = self.inner.add_object(compressed_stream(&closing)?);

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        contents.push(Object::Reference(close_id));

        page_dict.set("Contents", Object::Array(contents));
        self.inner.objects.insert(page_id, page_dict.into());
        Ok(())
    }
}

/// Build a FlateDecode content stream
fn compressed_stream(content: &[u8]) -> Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    let compressed = encoder.finish()?;
    Ok(Stream::new(
        Dictionary::from_iter(vec![("Filter", Object::Name(b"FlateDecode".to_vec()))]),
        compressed,
    ))
}

fn media_box_value(obj: &Object) -> Result<f64> {
    obj.as_f32()
        .map(|v| v as f64)
        .ok()
        .or_else(|| obj.as_i64().ok().map(|v| v as f64))
        .ok_or_else(|| PdfError::ParseError("Invalid MediaBox entry".to_string()))
}

/// Normalized (llx, lly, urx, ury) corners of a MediaBox array
fn media_box_corners(media_box: &[Object]) -> Result<(f64, f64, f64, f64)> {
    if media_box.len() < 4 {
        return Err(PdfError::ParseError("Invalid MediaBox format".to_string()));
    }
    let x1 = media_box_value(&media_box[0])?;
    let y1 = media_box_value(&media_box[1])?;
    let x2 = media_box_value(&media_box[2])?;
    let y2 = media_box_value(&media_box[3])?;
    Ok((x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)))
}

/// Extract (width, height) from a MediaBox array
fn extract_size_from_media_box(media_box: &[Object]) -> Result<(f64, f64)> {
    let (llx, lly, urx, ury) = media_box_corners(media_box)?;
    Ok((urx - llx, ury - lly))
}

/// Extract the lower-left corner from a MediaBox array
fn extract_origin_from_media_box(media_box: &[Object]) -> Result<(f64, f64)> {
    let (llx, lly, _, _) = media_box_corners(media_box)?;
    Ok((llx, lly))
}
