//! Font handling for PDF documents

use crate::text::escape_literal;
use crate::{PdfError, Result};
use lopdf::{Dictionary, Object, Stream};
use std::collections::BTreeSet;

/// Font weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
}

/// Font style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// TrueType font data
///
/// The face is validated once on load and re-parsed from the stored bytes
/// whenever metrics are needed; ttf-parser parsing is lazy so this is cheap.
#[derive(Debug, Clone)]
pub struct FontData {
    /// Font name/identifier
    pub name: String,
    /// Raw TTF data
    pub ttf_data: Vec<u8>,
}

/// PDF objects generated for TrueType font embedding
pub struct FontObjects {
    /// Type0 font dictionary
    pub type0_font: Dictionary,
    /// CIDFont Type2 dictionary
    pub cid_font: Dictionary,
    /// Font descriptor dictionary
    pub font_descriptor: Dictionary,
    /// Font file stream (TTF data)
    pub font_file_stream: Stream,
    /// ToUnicode CMap stream
    pub tounicode_stream: Stream,
}

impl FontData {
    /// Create font data from TTF bytes
    ///
    /// # Arguments
    /// * `name` - Font identifier
    /// * `ttf_data` - TrueType font file bytes
    pub fn from_ttf(name: &str, ttf_data: &[u8]) -> Result<Self> {
        ttf_parser::Face::parse(ttf_data, 0)
            .map_err(|e| PdfError::FontParseError(format!("{name}: {e:?}")))?;

        Ok(Self {
            name: name.to_string(),
            ttf_data: ttf_data.to_vec(),
        })
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.ttf_data, 0).ok()
    }

    /// Get glyph ID for a character
    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.face()
            .and_then(|face| face.glyph_index(c).map(|id| id.0))
    }

    /// Check if font has a glyph for the given character
    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).map(|id| id != 0).unwrap_or(false)
    }

    /// Get font units per em
    pub fn units_per_em(&self) -> u16 {
        self.face().map(|face| face.units_per_em()).unwrap_or(1000)
    }

    /// Get font ascender
    pub fn ascender(&self) -> i16 {
        self.face().map(|face| face.ascender()).unwrap_or(800)
    }

    /// Get font descender
    pub fn descender(&self) -> i16 {
        self.face().map(|face| face.descender()).unwrap_or(-200)
    }

    /// Weight and style as declared by the font's OS/2 table
    pub fn declared_variant(&self) -> (FontWeight, FontStyle) {
        match self.face() {
            Some(face) => (
                if face.is_bold() {
                    FontWeight::Bold
                } else {
                    FontWeight::Regular
                },
                if face.is_italic() {
                    FontStyle::Italic
                } else {
                    FontStyle::Normal
                },
            ),
            None => (FontWeight::Regular, FontStyle::Normal),
        }
    }

    /// Calculate text width in font units
    pub fn text_width(&self, text: &str) -> u32 {
        let Some(face) = self.face() else {
            return 0;
        };
        text.chars()
            .filter_map(|c| face.glyph_index(c))
            .filter_map(|id| face.glyph_hor_advance(id))
            .map(u32::from)
            .sum()
    }

    /// Calculate text width in points for a given font size
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let units_per_em = self.units_per_em() as f32;
        (self.text_width(text) as f32 / units_per_em) * font_size
    }

    /// Encode text as hex glyph ids for an Identity-H `Tj` operand
    pub fn encode_text_hex(&self, text: &str) -> String {
        let face = self.face();
        let mut result = String::with_capacity(text.len() * 4 + 2);
        result.push('<');
        for c in text.chars() {
            let gid = face
                .as_ref()
                .and_then(|f| f.glyph_index(c))
                .map(|id| id.0)
                .unwrap_or(0);
            result.push_str(&format!("{gid:04X}"));
        }
        result.push('>');
        result
    }

    /// Generate all PDF objects needed to embed this font
    ///
    /// `used_chars` drives the /W widths array and the ToUnicode map; the
    /// font program itself is embedded whole.
    pub fn to_pdf_objects(&self, used_chars: &BTreeSet<char>) -> FontObjects {
        let font_name = Object::Name(self.name.clone().into_bytes());

        let tounicode_content = self.generate_tounicode_cmap(used_chars);
        let tounicode_stream = Stream::new(
            Dictionary::from_iter(vec![("Type", "CMap".into())]),
            tounicode_content.into_bytes(),
        );

        let font_file_stream = Stream::new(
            Dictionary::from_iter(vec![("Length1", (self.ttf_data.len() as i64).into())]),
            self.ttf_data.clone(),
        );

        let units_per_em = self.units_per_em() as i64;
        let ascender = self.ascender() as i64;
        let descender = self.descender() as i64;

        let font_descriptor = Dictionary::from_iter(vec![
            ("Type", "FontDescriptor".into()),
            ("FontName", font_name.clone()),
            ("Flags", 4.into()),
            (
                "FontBBox",
                vec![0.into(), descender.into(), units_per_em.into(), ascender.into()].into(),
            ),
            ("ItalicAngle", 0.into()),
            ("Ascent", ascender.into()),
            ("Descent", descender.into()),
            ("CapHeight", ascender.into()),
            ("StemV", 80.into()),
        ]);

        let cid_system_info = Dictionary::from_iter(vec![
            ("Registry", Object::string_literal("Adobe")),
            ("Ordering", Object::string_literal("Identity")),
            ("Supplement", 0.into()),
        ]);

        let cid_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "CIDFontType2".into()),
            ("BaseFont", font_name.clone()),
            ("CIDSystemInfo", cid_system_info.into()),
            ("W", self.generate_widths_array(used_chars).into()),
            ("DW", 1000.into()),
        ]);

        let type0_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "Type0".into()),
            ("BaseFont", font_name),
            ("Encoding", "Identity-H".into()),
        ]);

        FontObjects {
            type0_font,
            cid_font,
            font_descriptor,
            font_file_stream,
            tounicode_stream,
        }
    }

    /// Generate /W array for glyph widths, scaled to the 1000-unit glyph space
    fn generate_widths_array(&self, used_chars: &BTreeSet<char>) -> Vec<Object> {
        let Some(face) = self.face() else {
            return Vec::new();
        };
        let scale = 1000.0 / face.units_per_em() as f32;

        let mut gids: Vec<ttf_parser::GlyphId> =
            used_chars.iter().filter_map(|&c| face.glyph_index(c)).collect();
        gids.sort();
        gids.dedup();

        let mut widths = Vec::with_capacity(gids.len() * 2);
        for gid in gids {
            let advance = face.glyph_hor_advance(gid).unwrap_or(1000) as f32 * scale;
            widths.push((gid.0 as i64).into());
            widths.push(vec![(advance.round() as i64).into()].into());
        }
        widths
    }

    /// Generate ToUnicode CMap stream content
    fn generate_tounicode_cmap(&self, used_chars: &BTreeSet<char>) -> String {
        let mut cmap = String::new();
        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
        cmap.push_str("/CMapType 2 def\n");
        cmap.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

        let chars: Vec<char> = used_chars.iter().copied().collect();
        // bfchar sections are limited to 100 entries each
        for chunk in chars.chunks(100) {
            cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for &c in chunk {
                let gid = self.glyph_id(c).unwrap_or(0);
                let mut utf16 = [0u16; 2];
                let units: String = c
                    .encode_utf16(&mut utf16)
                    .iter()
                    .map(|u| format!("{u:04X}"))
                    .collect();
                cmap.push_str(&format!("<{gid:04X}> <{units}>\n"));
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\nend\n");
        cmap
    }
}

/// Base-14 fonts available without embedding a font program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
}

/// Helvetica advance widths for U+0020..=U+007E, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778,
    722, 667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556,
    333, 500, 278, 556, 500, 722, 500, 500, 500, // a..z
    334, 260, 334, 584, // {..~
];

/// Helvetica-Bold advance widths for U+0020..=U+007E, in 1/1000 em
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    333, 333, 584, 584, 584, 611, 975, // :..@
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778,
    722, 667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    333, 278, 333, 584, 556, 333, // [..`
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611, 611,
    389, 556, 333, 611, 556, 778, 556, 556, 500, // a..z
    389, 280, 389, 584, // {..~
];

impl StandardFont {
    /// All supported standard fonts
    pub const ALL: [StandardFont; 4] = [
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::Courier,
        StandardFont::CourierBold,
    ];

    /// PostScript base font name
    pub fn base_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
        }
    }

    /// Family name shared by the regular and bold variants
    pub fn family(&self) -> &'static str {
        match self {
            StandardFont::Helvetica | StandardFont::HelveticaBold => "Helvetica",
            StandardFont::Courier | StandardFont::CourierBold => "Courier",
        }
    }

    pub fn weight(&self) -> FontWeight {
        match self {
            StandardFont::HelveticaBold | StandardFont::CourierBold => FontWeight::Bold,
            StandardFont::Helvetica | StandardFont::Courier => FontWeight::Regular,
        }
    }

    /// Advance width of one character in 1/1000 em
    pub fn char_width(&self, c: char) -> u16 {
        let table = match self {
            StandardFont::Courier | StandardFont::CourierBold => return 600,
            StandardFont::Helvetica => &HELVETICA_WIDTHS,
            StandardFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        match c as u32 {
            cp @ 0x20..=0x7E => table[(cp - 0x20) as usize],
            _ => 556,
        }
    }

    /// (ascender, descender) in 1/1000 em
    pub fn vertical_metrics(&self) -> (i16, i16) {
        match self {
            StandardFont::Helvetica | StandardFont::HelveticaBold => (718, -207),
            StandardFont::Courier => (629, -157),
            StandardFont::CourierBold => (626, -142),
        }
    }

    /// Calculate text width in points for a given font size
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.char_width(c))).sum();
        units as f32 / 1000.0 * font_size
    }

    /// Type1 font dictionary referencing the viewer's built-in program
    pub fn to_pdf_dict(&self) -> Dictionary {
        Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "Type1".into()),
            ("BaseFont", self.base_name().into()),
            ("Encoding", "WinAnsiEncoding".into()),
        ])
    }
}

/// Any font the document can draw with
#[derive(Debug, Clone)]
pub enum FontFace {
    TrueType(FontData),
    Standard(StandardFont),
}

impl FontFace {
    /// Calculate text width in points for a given font size
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        match self {
            FontFace::TrueType(data) => data.text_width_points(text, font_size),
            FontFace::Standard(font) => font.text_width_points(text, font_size),
        }
    }

    /// Ascender-to-descender extent in points for a given font size
    pub fn line_height_points(&self, font_size: f32) -> f32 {
        let (ascender, descender, units_per_em) = match self {
            FontFace::TrueType(data) => (data.ascender(), data.descender(), data.units_per_em()),
            FontFace::Standard(font) => {
                let (asc, desc) = font.vertical_metrics();
                (asc, desc, 1000)
            }
        };
        (ascender as f32 - descender as f32) / units_per_em as f32 * font_size
    }

    /// Encode text as a `Tj` operand for this font
    pub fn encode(&self, text: &str) -> String {
        match self {
            FontFace::TrueType(data) => data.encode_text_hex(text),
            FontFace::Standard(_) => format!("({})", escape_literal(text)),
        }
    }
}

/// Builder for registering font families
#[derive(Default)]
pub struct FontFamilyBuilder {
    regular: Option<Vec<u8>>,
    bold: Option<Vec<u8>>,
    italic: Option<Vec<u8>>,
    bold_italic: Option<Vec<u8>>,
}

impl FontFamilyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regular(mut self, ttf_data: Vec<u8>) -> Self {
        self.regular = Some(ttf_data);
        self
    }

    pub fn bold(mut self, ttf_data: Vec<u8>) -> Self {
        self.bold = Some(ttf_data);
        self
    }

    pub fn italic(mut self, ttf_data: Vec<u8>) -> Self {
        self.italic = Some(ttf_data);
        self
    }

    pub fn bold_italic(mut self, ttf_data: Vec<u8>) -> Self {
        self.bold_italic = Some(ttf_data);
        self
    }

    /// Parse every provided variant
    ///
    /// Variant names follow `family`, `family-bold`, `family-italic`,
    /// `family-bold-italic`. A regular variant is required.
    pub fn build(self, family_name: &str) -> Result<Vec<(FontData, FontWeight, FontStyle)>> {
        let regular = self.regular.ok_or_else(|| {
            PdfError::FontParseError("FontFamily must have at least a regular variant".to_string())
        })?;

        let mut variants = vec![(
            FontData::from_ttf(family_name, &regular)?,
            FontWeight::Regular,
            FontStyle::Normal,
        )];

        let extra = [
            (self.bold, "bold", FontWeight::Bold, FontStyle::Normal),
            (self.italic, "italic", FontWeight::Regular, FontStyle::Italic),
            (self.bold_italic, "bold-italic", FontWeight::Bold, FontStyle::Italic),
        ];
        for (data, suffix, weight, style) in extra {
            if let Some(data) = data {
                let name = format!("{family_name}-{suffix}");
                variants.push((FontData::from_ttf(&name, &data)?, weight, style));
            }
        }

        Ok(variants)
    }
}
