use unicode_width::UnicodeWidthStr;

/// Column alignment for generated declarations. Widths are terminal cells,
/// so full-width names from localized sheets line up too.
pub struct ColumnLayout {
    pub min_width: usize,
    pub gutter: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            min_width: 25,
            gutter: 1,
        }
    }
}

impl ColumnLayout {
    pub fn text_width(&self, text: &str) -> usize {
        UnicodeWidthStr::width(text)
    }

    /// Width of a column holding all `cells`, including the gutter.
    pub fn column_width<'a>(&self, cells: impl IntoIterator<Item = &'a str>) -> usize {
        let widest = cells
            .into_iter()
            .map(|c| self.text_width(c))
            .max()
            .unwrap_or(0);
        (widest + self.gutter).max(self.min_width)
    }

    pub fn pad(&self, text: &str, width: usize) -> String {
        let fill = width.saturating_sub(self.text_width(text));
        let mut out = String::with_capacity(text.len() + fill);
        out.push_str(text);
        out.extend(std::iter::repeat_n(' ', fill));
        out
    }
}
