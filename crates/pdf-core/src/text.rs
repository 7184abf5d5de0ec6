//! Text rendering utilities

use crate::document::Color;
use crate::Align;

/// Context for rendering text
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "F1")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Text color (RGB)
    pub color: Color,
}

/// Calculate X offset for text alignment inside a container
///
/// # Arguments
/// * `text_width` - Width of text in points
/// * `container_width` - Available width for alignment
/// * `align` - Desired alignment
pub fn calculate_x_offset(text_width: f64, container_width: f64, align: Align) -> f64 {
    match align {
        Align::Left => 0.0,
        Align::Center => (container_width - text_width) / 2.0,
        Align::Right => container_width - text_width,
    }
}

/// Generate PDF operators for a single text run
///
/// Creates the text operators (BT, rg, Tf, Td, Tj, ET) drawing `operand` with
/// its baseline starting at `(x, y)` in PDF coordinates.
///
/// # Arguments
/// * `operand` - Encoded `Tj` operand, hex (`<0041>`) or literal (`(A)`)
/// * `x` - X coordinate in points (from left)
/// * `y` - Y coordinate in points (from bottom)
/// * `ctx` - Text rendering context
pub fn generate_text_operators(operand: &str, x: f64, y: f64, ctx: &TextRenderContext) -> Vec<u8> {
    let mut ops = String::new();
    ops.push_str("BT\n");
    ops.push_str(&format!(
        "{} {} {} rg\n",
        ctx.color.r, ctx.color.g, ctx.color.b
    ));
    ops.push_str(&format!("/{} {} Tf\n", ctx.font_name, ctx.font_size));
    ops.push_str(&format!("{x} {y} Td\n"));
    ops.push_str(&format!("{operand} Tj\n"));
    ops.push_str("ET\n");
    ops.into_bytes()
}

/// Escape text for a WinAnsi literal string
///
/// Parentheses and backslashes are escaped, Latin-1 characters above ASCII
/// become octal escapes, and anything outside Latin-1 is replaced by `?`.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{A0}'..='\u{FF}' => out.push_str(&format!("\\{:03o}", c as u32)),
            _ => out.push('?'),
        }
    }
    out
}
